/*
    Copyright 2023 github.com/programaquatic

   Licensed under the Apache License, Version 2.0 (the "License");
   you may not use this file except in compliance with the License.
   You may obtain a copy of the License at

       http://www.apache.org/licenses/LICENSE-2.0

   Unless required by applicable law or agreed to in writing, software
   distributed under the License is distributed on an "AS IS" BASIS,
   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
   See the License for the specific language governing permissions and
   limitations under the License.
*/

use serde::Deserialize;
use std::fs;

use crate::error::ConfigError;

/// Reads a `//`-comment-tolerant JSON file into `T`. Comments are stripped
/// line-by-line before handing the text to `serde_json`, matching the format
/// tunables and scenario fixtures are checked in as.
pub fn read_json<T>(path: &str) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de>,
{
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;

    let mut cleaned = String::with_capacity(raw.len());
    for line in raw.lines().filter(|l| !l.trim_start().starts_with("//")) {
        cleaned.push_str(line);
    }

    serde_json::from_str(&cleaned).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}
