// SPDX-License-Identifier: Apache-2.0

mod file_id;
mod reader;

pub use file_id::{FileId, KEY_SEPARATOR, absolute_path, file_key, key_for, key_path};
pub use reader::{LineReader, split_lines};
