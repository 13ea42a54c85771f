// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Find the functions that depend on a set of variables, either because they reference one of the
// variables directly, or because they call a function that does.

use crate::ir::*;
use crate::*;

#[derive(Default)]
#[cfg_attr(debug_assertions, derive(Debug))]
struct FunctionInfo {
    references_variable: bool,
    callees: HashSet<FunctionId>,
}

pub fn discover_dependent_functions<IsVariable>(
    ir: &IR,
    is_variable: IsVariable,
) -> HashSet<FunctionId>
where
    IsVariable: Fn(VariableId) -> bool,
{
    // Gather the direct references and the call graph first.
    let mut function_infos: HashMap<FunctionId, FunctionInfo> = HashMap::new();

    traverser::visitor::for_each_function(&mut function_infos, &ir.globals, |infos, id, body| {
        let mut info = FunctionInfo::default();
        traverser::visitor::for_each_expression_in_block(
            &mut info,
            body,
            &|info: &mut FunctionInfo, expression| match expression {
                &Expression::Symbol(variable_id) => {
                    info.references_variable |= is_variable(variable_id);
                }
                Expression::Call(callee, _) => {
                    info.callees.insert(*callee);
                }
                _ => {}
            },
        );
        infos.insert(id, info);
    });

    let mut dependents: HashSet<FunctionId> = function_infos
        .iter()
        .filter(|(_, info)| info.references_variable)
        .map(|(&id, _)| id)
        .collect();

    // Propagate to the callers until nothing changes.  The call graph is small, so iterating over
    // all functions every time is fine.
    loop {
        let new_dependents: Vec<FunctionId> = function_infos
            .iter()
            .filter(|&(id, info)| {
                !dependents.contains(id)
                    && info.callees.iter().any(|callee| dependents.contains(callee))
            })
            .map(|(&id, _)| id)
            .collect();

        if new_dependents.is_empty() {
            break;
        }
        dependents.extend(new_dependents);
    }

    dependents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_builder::TestBuilder;

    #[test]
    fn transitive_callers_are_included() {
        let mut builder = TestBuilder::new(ShaderType::Fragment);
        let global = builder.non_const_global("g", TYPE_ID_FLOAT, None);
        let other = builder.non_const_global("h", TYPE_ID_FLOAT, None);

        let leaf = builder.function("leaf", &[], TYPE_ID_FLOAT);
        builder.define(leaf, vec![Statement::Return(Some(Expression::symbol(global)))]);
        let middle = builder.function("middle", &[], TYPE_ID_FLOAT);
        builder.define(middle, vec![Statement::Return(Some(Expression::call(leaf, vec![])))]);
        let unrelated = builder.function("unrelated", &[], TYPE_ID_FLOAT);
        builder.define(unrelated, vec![Statement::Return(Some(Expression::symbol(other)))]);
        let caller_of_unrelated = builder.function("callerOfUnrelated", &[], TYPE_ID_VOID);
        builder.define(
            caller_of_unrelated,
            vec![Statement::Expression(Expression::call(unrelated, vec![]))],
        );
        let main = builder.main(vec![
            Statement::Expression(Expression::call(middle, vec![])),
            Statement::Expression(Expression::call(caller_of_unrelated, vec![])),
        ]);
        let ir = builder.build();

        let dependents = discover_dependent_functions(&ir, |id| id == global);
        assert_eq!(dependents, HashSet::from([leaf, middle, main]));
    }

    #[test]
    fn nothing_referenced_means_no_dependents() {
        let mut builder = TestBuilder::new(ShaderType::Vertex);
        let global = builder.non_const_global("g", TYPE_ID_FLOAT, None);
        let helper = builder.function("helper", &[], TYPE_ID_VOID);
        builder.define(helper, vec![]);
        builder.main(vec![Statement::Expression(Expression::call(helper, vec![]))]);
        let ir = builder.build();

        assert!(discover_dependent_functions(&ir, |id| id == global).is_empty());
    }

    #[test]
    fn references_in_nested_blocks_are_found() {
        let mut builder = TestBuilder::new(ShaderType::Vertex);
        let global = builder.non_const_global("g", TYPE_ID_INT, None);
        let helper = builder.function("helper", &[], TYPE_ID_VOID);
        builder.define(
            helper,
            vec![Statement::Loop(
                Expression::Constant(ConstantValue::Bool(true)),
                Block::from_statements(vec![Statement::If(
                    Expression::binary(
                        BinaryOpCode::Equal,
                        Expression::symbol(global),
                        Expression::int(1),
                    ),
                    Block::from_statements(vec![Statement::Break]),
                    None,
                )]),
            )],
        );
        let main = builder.main(vec![Statement::Expression(Expression::call(helper, vec![]))]);
        let ir = builder.build();

        assert_eq!(
            discover_dependent_functions(&ir, |id| id == global),
            HashSet::from([helper, main])
        );
    }
}
