use std::collections::{BTreeSet, HashMap};
use std::fs;

use camino::Utf8Path;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::{Pmid, StudyCode};
use crate::error::CuratorError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    #[serde(default, deserialize_with = "lenient_string")]
    pub pmid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub first_author: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub journal: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub biobank_study_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub study_code: Option<String>,
    #[serde(default)]
    pub study_codes: Vec<String>,
    #[serde(default)]
    pub study_name: Option<String>,
    #[serde(default)]
    pub findings: Option<String>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: Option<String>,
}

impl Publication {
    pub fn primary_study_code(&self) -> Option<StudyCode> {
        StudyCode::assigned(self.biobank_study_code.as_deref())
            .or_else(|| StudyCode::assigned(self.study_code.as_deref()))
            .or_else(|| {
                self.study_codes
                    .iter()
                    .find_map(|code| StudyCode::assigned(Some(code)))
            })
    }

    pub fn pmid(&self) -> Option<Pmid> {
        Pmid::parse_known(self.pmid.as_deref())
    }

    pub fn identifier(&self) -> String {
        match self.pmid() {
            Some(pmid) => pmid.as_str().to_string(),
            None => self.title_or_unknown().to_string(),
        }
    }

    pub fn title_or_unknown(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown")
    }

    pub fn pmid_label(&self) -> String {
        self.pmid()
            .map(|pmid| pmid.as_str().to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }

    pub fn year_label(&self) -> String {
        self.year_number()
            .map(|year| year.to_string())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn year_number(&self) -> Option<i32> {
        let value = self.year.as_deref()?.trim();
        value
            .parse::<i32>()
            .ok()
            .or_else(|| value.parse::<f64>().ok().map(|year| year as i32))
    }

    pub fn first_author_label(&self) -> String {
        self.first_author
            .clone()
            .or_else(|| {
                self.authors
                    .as_deref()
                    .and_then(|authors| authors.split([',', ';']).next())
                    .map(|author| author.trim().to_string())
            })
            .unwrap_or_else(|| "Unknown".to_string())
    }

    fn has_abstract(&self) -> bool {
        self.abstract_text
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }

    fn completeness_rank(&self) -> (bool, bool, usize) {
        (
            self.pmid().is_some(),
            self.has_abstract(),
            self.abstract_text.as_deref().map(str::len).unwrap_or(0),
        )
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PublicationsFile {
    Wrapped { publications: Vec<Publication> },
    Bare(Vec<Publication>),
}

pub fn load_publications(path: &Utf8Path) -> Result<Vec<Publication>, CuratorError> {
    let content = fs::read_to_string(path.as_std_path()).map_err(|err| CuratorError::SourceRead {
        path: path.to_string(),
        message: err.to_string(),
    })?;
    parse_publications(&content).map_err(|err| CuratorError::PublicationsParse {
        path: path.to_string(),
        message: err.to_string(),
    })
}

pub fn parse_publications(content: &str) -> Result<Vec<Publication>, serde_json::Error> {
    let file: PublicationsFile = serde_json::from_str(content)?;
    Ok(match file {
        PublicationsFile::Wrapped { publications } => publications,
        PublicationsFile::Bare(publications) => publications,
    })
}

#[derive(Debug, Clone)]
pub struct Consolidation {
    pub publications: Vec<Publication>,
    pub merged_titles: usize,
}

/// Merges publications that share a title. The most complete record of each
/// group is kept (known PMID, then a non-empty abstract, then the longer
/// abstract; ties keep the earliest) and carries every study code of the group.
/// The result is ordered by year, newest first, unknown years last.
pub fn consolidate(publications: Vec<Publication>) -> Consolidation {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Publication>> = HashMap::new();
    for publication in publications {
        let key = publication.title_or_unknown().trim().to_string();
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(publication);
    }

    let mut merged_titles = 0;
    let mut consolidated = Vec::with_capacity(order.len());
    for key in order {
        let Some(mut group) = groups.remove(&key) else {
            continue;
        };
        if group.len() == 1 {
            consolidated.extend(group.pop());
            continue;
        }
        merged_titles += 1;

        let codes = group
            .iter()
            .flat_map(|publication| {
                [
                    publication.biobank_study_code.clone(),
                    publication.study_code.clone(),
                ]
                .into_iter()
                .flatten()
                .chain(publication.study_codes.iter().cloned())
            })
            .filter_map(|code| StudyCode::assigned(Some(&code)))
            .map(|code| code.as_str().to_string())
            .collect::<BTreeSet<_>>();

        let mut best_index = 0;
        for (index, candidate) in group.iter().enumerate().skip(1) {
            if candidate.completeness_rank() > group[best_index].completeness_rank() {
                best_index = index;
            }
        }
        let mut merged = group.swap_remove(best_index);
        if let Some(first) = codes.iter().next() {
            merged.study_code = Some(first.clone());
            merged.biobank_study_code = Some(first.clone());
        }
        merged.study_codes = codes.into_iter().collect();
        consolidated.push(merged);
    }

    consolidated.sort_by_key(|publication| std::cmp::Reverse(publication.year_number().unwrap_or(0)));

    Consolidation {
        publications: consolidated,
        merged_titles,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::Bool(flag)) => Some(flag.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_and_bare_files() {
        let wrapped = r#"{"publications": [{"title": "A", "pmid": 123, "biobank_study_code": "DU08-04"}]}"#;
        let bare = r#"[{"title": "B", "pmid": "N/A", "study_code": "Unknown", "year": 2019}]"#;

        let wrapped = parse_publications(wrapped).unwrap();
        assert_eq!(wrapped[0].pmid_label(), "123");
        assert_eq!(wrapped[0].primary_study_code().unwrap().as_str(), "DU08-04");

        let bare = parse_publications(bare).unwrap();
        assert_eq!(bare[0].pmid_label(), "N/A");
        assert_eq!(bare[0].primary_study_code(), None);
        assert_eq!(bare[0].year_label(), "2019");
    }

    #[test]
    fn first_author_falls_back_to_author_list() {
        let publication = Publication {
            authors: Some("Woods CW, Zaas AK".to_string()),
            ..Publication::default()
        };
        assert_eq!(publication.first_author_label(), "Woods CW");
    }
}
