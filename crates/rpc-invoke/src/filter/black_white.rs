//! Black/white list parsed from a filter option string.
//!
//! Names are separated by `;`, `,` or whitespace. A `-` prefix puts the name
//! on the black list, anything else goes on the white list.

use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlackWhiteList {
    white: HashSet<String>,
    black: HashSet<String>,
}

impl BlackWhiteList {
    pub fn parse(option: Option<&str>) -> Self {
        let mut list = Self::default();
        let Some(option) = option else {
            return list;
        };
        for token in option
            .split(|c: char| c == ';' || c == ',' || c.is_whitespace())
            .map(str::trim)
            .filter(|t| !t.is_empty())
        {
            match token.strip_prefix('-') {
                Some(name) if !name.is_empty() => {
                    list.black.insert(name.to_string());
                }
                Some(_) => {}
                None => {
                    list.white.insert(token.to_string());
                }
            }
        }
        list
    }

    pub fn is_white(&self, name: &str) -> bool {
        self.white.contains(name)
    }

    pub fn is_black(&self, name: &str) -> bool {
        self.black.contains(name)
    }

    /// Every name mentioned, with or without the `-` prefix
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.white.iter().chain(self.black.iter()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_empty() && self.black.is_empty()
    }
}
