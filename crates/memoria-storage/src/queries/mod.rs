// SPDX-FileCopyrightText: 2026 Memoria Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for the relational store.

pub mod rejections;
pub mod relations;
pub mod traversal;
