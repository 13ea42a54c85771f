// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Reflection information gathered while transforming the shader, which the backend needs to match
// the resources it binds with what the shader declares.

use crate::ir::*;
use crate::*;

#[derive(Default, Clone)]
#[cfg_attr(debug_assertions, derive(Debug))]
pub struct Reflection {
    // When a shader variable is split into multiple variables (such as a sampler turned into a pair
    // of texture and sampler parameters), each new variable maps back to the original name.
    original_names: HashMap<VariableId, String>,
}

impl Reflection {
    pub fn new() -> Reflection {
        Reflection::default()
    }

    pub fn add_original_name(&mut self, variable_id: VariableId, original_name: &str) {
        self.original_names.insert(variable_id, original_name.to_string());
    }

    pub fn get_original_name(&self, variable_id: VariableId) -> Option<&str> {
        self.original_names.get(&variable_id).map(String::as_str)
    }

    pub fn original_name_count(&self) -> usize {
        self.original_names.len()
    }
}
