//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

pub mod collections;
pub mod db;
pub mod debug;
pub mod domain;
pub mod error;
pub mod events;
pub mod hysteresis;
pub mod instance;
pub mod interface;
pub mod link;
pub mod neighbor;
pub mod packet;
pub mod reader;
