//! 시작 페이로드 템플릿 -- `{{Name}}` 자리표시자 치환
//!
//! 시작 스크립트와 Dockerfile 렌더링에 사용됩니다. 템플릿은 생성 시 한 번 파싱되고,
//! 값이 주어지지 않은 자리표시자는 렌더링 에러가 됩니다.

use std::collections::BTreeSet;

use crate::error::HarnessError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Placeholder(String),
}

/// 파싱된 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

impl Template {
    /// 템플릿 텍스트를 파싱합니다.
    ///
    /// 닫히지 않은 `{{`와 식별자가 아닌 자리표시자 이름은 에러입니다.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, HarnessError> {
        let name = name.into();
        let mut segments = Vec::new();
        let mut rest = text;

        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Text(rest[..open].to_owned()));
            }
            let after_open = &rest[open + 2..];
            let close = after_open.find("}}").ok_or_else(|| {
                HarnessError::Template(format!("{name}: unclosed '{{{{' placeholder"))
            })?;
            let key = after_open[..close].trim();
            if !is_identifier(key) {
                return Err(HarnessError::Template(format!(
                    "{name}: invalid placeholder name '{key}'"
                )));
            }
            segments.push(Segment::Placeholder(key.to_owned()));
            rest = &after_open[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_owned()));
        }

        Ok(Self { name, segments })
    }

    /// 템플릿 이름
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 템플릿이 참조하는 자리표시자 이름 (정렬, 중복 제거)
    pub fn placeholders(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Placeholder(key) => Some(key.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// 주어진 값으로 자리표시자를 치환합니다.
    ///
    /// 템플릿이 쓰지 않는 값은 무시됩니다.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, HarnessError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Placeholder(key) => {
                    let value = vars
                        .iter()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| *v)
                        .ok_or_else(|| {
                            HarnessError::Template(format!(
                                "{}: no value for placeholder '{key}'",
                                self.name
                            ))
                        })?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }
}

fn is_identifier(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
