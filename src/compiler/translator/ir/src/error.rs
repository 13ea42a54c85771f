// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//
// Errors that transformations report back to the caller.  Violations of the IR's own rules are
// not errors; they are internal errors and panic instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("the shader does not define main()")]
    MissingMain,
    #[error("main() must return void for the {pipeline} pipeline to return its struct")]
    NonVoidMain { pipeline: &'static str },
    #[error("function `{function}` has no parameter holding the {pipeline} pipeline struct")]
    MissingInstanceParam { function: String, pipeline: &'static str },
    #[error("struct `{struct_name}` has no field named `{field}`")]
    MissingField { struct_name: String, field: String },
}

pub type Result<T> = std::result::Result<T, Error>;
