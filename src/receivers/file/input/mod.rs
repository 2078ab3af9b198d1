// SPDX-License-Identifier: Apache-2.0

pub mod file;

pub use file::{FileId, LineReader, absolute_path, file_key, key_for, key_path, split_lines};
