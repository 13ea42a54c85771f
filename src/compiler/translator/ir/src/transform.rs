// Copyright 2024 The ANGLE Project Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.
pub mod prune_unused_declarations;

// Transformations specific to the MSL backend.
pub mod msl {
    pub mod discover_dependent_functions;
    pub mod modify_struct;
    pub mod pipeline;
    pub mod rewrite_pipelines;
}
