// Copyright 2025 Muvon Un Limited
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! LSP (Language Server Protocol) integration for the MCP server
//!
//! One [`client::LspClient`] per configured peer owns its subprocess and all
//! per-document state; the [`multiplexer::Multiplexer`] matches files to
//! clients by glob and starts them lazily; [`provider::LspProvider`]
//! translates the MCP tool catalog into LSP requests and normalizes the
//! polymorphic replies.

pub mod client;
pub mod extensions;
pub mod multiplexer;
pub mod normalize;
pub mod protocol;
pub mod provider;

pub use client::LspClient;
pub use multiplexer::Multiplexer;
pub use provider::LspProvider;
