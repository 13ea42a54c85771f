// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// The set of variables and struct fields that are qualified `invariant`.  The front end registers
// invariant outputs here, and transformations that move a variable into a struct field carry the
// qualifier over to the field.

use crate::ir::*;
use crate::*;

#[derive(Default, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Invariants {
    variables: HashSet<VariableId>,
    // Fields are identified by the struct type and the index of the field in it.
    fields: HashSet<(TypeId, u32)>,
}

impl Invariants {
    pub fn new() -> Invariants {
        Invariants::default()
    }

    pub fn insert_variable(&mut self, variable_id: VariableId) {
        self.variables.insert(variable_id);
    }
    pub fn insert_field(&mut self, struct_type_id: TypeId, field: u32) {
        self.fields.insert((struct_type_id, field));
    }

    pub fn contains_variable(&self, variable_id: VariableId) -> bool {
        self.variables.contains(&variable_id)
    }
    pub fn contains_field(&self, struct_type_id: TypeId, field: u32) -> bool {
        self.fields.contains(&(struct_type_id, field))
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty() && self.fields.is_empty()
    }
}
