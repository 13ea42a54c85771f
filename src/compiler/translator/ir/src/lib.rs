// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
//

pub mod debug;
pub mod error;
pub mod invariants;
pub mod ir;
pub mod reflection;
pub mod transform;
pub mod traverser;
pub mod util;
pub mod validator;

#[cfg(test)]
mod test_builder;

use error::{Error, Result};
use std::collections::{HashMap, HashSet};
