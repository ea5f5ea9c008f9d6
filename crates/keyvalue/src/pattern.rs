// SPDX-License-Identifier: LGPL-2.1-or-later
// Copyright (C) 2025 Shahzad A. Bhatti <bhatti@plexobject.com>
//
// This file is part of certkv.
//
// certkv is free software: you can redistribute it and/or modify
// it under the terms of the GNU Lesser General Public License as published by
// the Free Software Foundation, either version 2.1 of the License, or
// (at your option) any later version.
//
// certkv is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public License
// along with certkv. If not, see <https://www.gnu.org/licenses/>.

//! Literal prefix patterns for backend pattern-matching operators.
//!
//! Caller-supplied prefixes are always bound as parameters and escaped, so
//! wildcard characters inside keys match only themselves.

/// Escape character used with `LIKE ... ESCAPE '\'`.
pub const LIKE_ESCAPE: char = '\\';

/// PostgreSQL `LIKE` pattern matching every string that starts with `prefix`.
///
/// `\`, `%` and `_` are escaped with [`LIKE_ESCAPE`].
pub fn like_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// SQLite `GLOB` pattern matching every string that starts with `prefix`.
///
/// GLOB is case-sensitive, unlike SQLite's `LIKE`. It has no escape
/// character, so `*`, `?` and `[` become single-member character classes.
pub fn glob_prefix_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        match c {
            '*' => pattern.push_str("[*]"),
            '?' => pattern.push_str("[?]"),
            '[' => pattern.push_str("[[]"),
            _ => pattern.push(c),
        }
    }
    pattern.push('*');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_plain_prefix() {
        assert_eq!(like_prefix_pattern("certificates/"), "certificates/%");
        assert_eq!(like_prefix_pattern(""), "%");
    }

    #[test]
    fn test_like_escapes_metacharacters() {
        assert_eq!(like_prefix_pattern("a_b%c"), r"a\_b\%c%");
        assert_eq!(like_prefix_pattern(r"dir\name"), r"dir\\name%");
    }

    #[test]
    fn test_like_rejects_injection_text() {
        // Quotes are data, not syntax: the pattern is always a bound parameter.
        assert_eq!(like_prefix_pattern("x' OR '1'='1"), "x' OR '1'='1%");
    }

    #[test]
    fn test_glob_plain_prefix() {
        assert_eq!(glob_prefix_pattern("acme/"), "acme/*");
        assert_eq!(glob_prefix_pattern(""), "*");
    }

    #[test]
    fn test_glob_escapes_metacharacters() {
        assert_eq!(glob_prefix_pattern("a*b?c[d]"), "a[*]b[?]c[[]d]*");
    }
}
