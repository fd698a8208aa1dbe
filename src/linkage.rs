use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::assays::AssayRecord;
use crate::domain::{StudyCode, truncate_chars};
use crate::inventory::{InventoryTable, SampleRecord};
use crate::publications::Publication;

pub const NO_ASSAYS_TRACKED: &str = "No assays tracked";
const SAMPLE_TYPE_LIMIT: usize = 10;
const MULTI_USE_TITLE_LIMIT: usize = 3;
const TOP_MULTI_USE: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationStudyLink {
    pub publication_id: String,
    pub pmid: String,
    pub year: String,
    pub study_code: String,
    pub study_name: String,
    pub total_samples_in_study: usize,
    pub participants_in_study: usize,
    pub sample_types_available: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationAssayLink {
    pub publication_title: String,
    pub pmid: String,
    pub year: String,
    pub study_code: String,
    pub assay_type: String,
    pub assay_samples: u64,
    pub subject_range: String,
    pub timepoints: String,
    pub data_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePublicationLink {
    pub sample_barcode_id: String,
    pub participant_id: Option<String>,
    pub study_code: String,
    pub timepoint_normalized: Option<String>,
    pub sample_type: Option<String>,
    pub is_available: bool,
    pub is_transferred: bool,
    pub publication_id: String,
    pub publication_title: String,
    pub publication_year: String,
    pub publication_pmid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiUseSample {
    pub sample_barcode_id: String,
    pub num_publications: usize,
    pub publication_titles: String,
    pub study_code: String,
    pub sample_type: Option<String>,
    pub is_transferred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub total_samples_collected: usize,
    pub participants: usize,
    pub sample_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssaySummary {
    pub assay_type: String,
    pub samples_assayed: u64,
    pub subjects: String,
    pub timepoints: String,
    pub data_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRef {
    pub title: String,
    pub year: String,
    pub pmid: String,
    pub journal: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceChain {
    pub study_code: String,
    pub collection: CollectionSummary,
    pub assay: AssaySummary,
    pub publications: Vec<PublicationRef>,
    pub num_publications: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyCrossReference {
    pub study_code: String,
    pub total_samples: usize,
    pub participants: usize,
    pub sample_types: usize,
    pub assays_performed: usize,
    pub unique_assay_types: usize,
    pub total_assay_samples: u64,
    pub publications: usize,
    pub samples_available: usize,
    pub samples_transferred: usize,
}

#[derive(Debug, Clone, Default)]
struct StudyStats<'a> {
    samples: Vec<&'a SampleRecord>,
    participants: usize,
    sample_types: Vec<String>,
}

impl<'a> StudyStats<'a> {
    fn new(samples: Vec<&'a SampleRecord>) -> Self {
        let participants = samples
            .iter()
            .filter_map(|row| row.participant_id.as_deref())
            .collect::<HashSet<_>>()
            .len();
        let mut seen = HashSet::new();
        let sample_types = samples
            .iter()
            .filter_map(|row| row.sample_type.as_deref())
            .filter(|value| seen.insert(*value))
            .map(str::to_string)
            .collect();
        Self {
            samples,
            participants,
            sample_types,
        }
    }

    fn limited_sample_types(&self) -> Vec<String> {
        self.sample_types
            .iter()
            .take(SAMPLE_TYPE_LIMIT)
            .cloned()
            .collect()
    }
}

fn study_stats(inventory: &InventoryTable) -> HashMap<String, StudyStats<'_>> {
    inventory
        .by_study()
        .into_iter()
        .map(|(code, rows)| (code.to_string(), StudyStats::new(rows)))
        .collect()
}

fn assays_by_study(assays: &[AssayRecord]) -> HashMap<&str, Vec<&AssayRecord>> {
    let mut index: HashMap<&str, Vec<&AssayRecord>> = HashMap::new();
    for assay in assays {
        if let Some(code) = assay.study_code.as_deref() {
            index.entry(code).or_default().push(assay);
        }
    }
    index
}

fn assigned_publications(publications: &[Publication]) -> Vec<(&Publication, StudyCode)> {
    publications
        .iter()
        .filter_map(|publication| {
            publication
                .primary_study_code()
                .map(|code| (publication, code))
        })
        .collect()
}

pub fn link_publications_to_studies(
    publications: &[Publication],
    inventory: &InventoryTable,
) -> Vec<PublicationStudyLink> {
    let stats = study_stats(inventory);
    assigned_publications(publications)
        .into_iter()
        .filter_map(|(publication, code)| {
            let study = stats.get(code.as_str())?;
            Some(PublicationStudyLink {
                publication_id: truncate_chars(publication.title_or_unknown(), 100),
                pmid: publication.pmid_label(),
                year: publication.year_label(),
                study_code: code.to_string(),
                study_name: publication
                    .study_name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                total_samples_in_study: study.samples.len(),
                participants_in_study: study.participants,
                sample_types_available: study.limited_sample_types().join(", "),
            })
        })
        .collect()
}

pub fn link_publications_to_assays(
    publications: &[Publication],
    assays: &[AssayRecord],
) -> Vec<PublicationAssayLink> {
    let by_study = assays_by_study(assays);
    let mut links = Vec::new();
    for (publication, code) in assigned_publications(publications) {
        let title = truncate_chars(publication.title_or_unknown(), 100);
        let pmid = publication.pmid_label();
        let year = publication.year_label();
        match by_study.get(code.as_str()) {
            Some(study_assays) if !study_assays.is_empty() => {
                links.extend(study_assays.iter().map(|assay| PublicationAssayLink {
                    publication_title: title.clone(),
                    pmid: pmid.clone(),
                    year: year.clone(),
                    study_code: code.to_string(),
                    assay_type: assay.assay_type.clone(),
                    assay_samples: assay.sample_count,
                    subject_range: assay.subject_range.clone(),
                    timepoints: assay.timepoints.clone(),
                    data_key: assay.data_key.clone(),
                }));
            }
            _ => links.push(PublicationAssayLink {
                publication_title: title,
                pmid,
                year,
                study_code: code.to_string(),
                assay_type: NO_ASSAYS_TRACKED.to_string(),
                assay_samples: 0,
                subject_range: "N/A".to_string(),
                timepoints: "N/A".to_string(),
                data_key: "N/A".to_string(),
            }),
        }
    }
    links
}

// Every sample of a study pairs with every publication citing it, so this
// over-approximates actual use.
pub fn map_samples_to_publications(
    inventory: &InventoryTable,
    publications: &[Publication],
) -> Vec<SamplePublicationLink> {
    let by_study = inventory.by_study();
    let mut links = Vec::new();
    for (publication, code) in assigned_publications(publications) {
        let Some(samples) = by_study.get(code.as_str()) else {
            continue;
        };
        let publication_id = publication.identifier();
        let title = truncate_chars(publication.title_or_unknown(), 80);
        let year = publication.year_label();
        let pmid = publication.pmid_label();
        links.extend(samples.iter().map(|sample| SamplePublicationLink {
            sample_barcode_id: sample.sample_barcode_id.clone(),
            participant_id: sample.participant_id.clone(),
            study_code: code.to_string(),
            timepoint_normalized: sample.timepoint_normalized.clone(),
            sample_type: sample.sample_type.clone(),
            is_available: sample.is_available,
            is_transferred: sample.is_transferred,
            publication_id: publication_id.clone(),
            publication_title: title.clone(),
            publication_year: year.clone(),
            publication_pmid: pmid.clone(),
        }));
    }
    links
}

pub fn multi_use_samples(links: &[SamplePublicationLink]) -> Vec<MultiUseSample> {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&SamplePublicationLink>> = HashMap::new();
    for link in links {
        let barcode = link.sample_barcode_id.as_str();
        let group = groups.entry(barcode).or_default();
        if group.is_empty() {
            order.push(barcode);
        }
        group.push(link);
    }

    let mut samples = order
        .into_iter()
        .filter_map(|barcode| {
            let group = &groups[barcode];
            let distinct = group
                .iter()
                .map(|link| link.publication_id.as_str())
                .collect::<HashSet<_>>()
                .len();
            if distinct <= 1 {
                return None;
            }
            let mut seen = HashSet::new();
            let titles = group
                .iter()
                .map(|link| link.publication_title.as_str())
                .filter(|title| seen.insert(*title))
                .take(MULTI_USE_TITLE_LIMIT)
                .collect::<Vec<_>>()
                .join(" | ");
            let first = group[0];
            Some(MultiUseSample {
                sample_barcode_id: barcode.to_string(),
                num_publications: distinct,
                publication_titles: titles,
                study_code: first.study_code.clone(),
                sample_type: first.sample_type.clone(),
                is_transferred: first.is_transferred,
            })
        })
        .collect::<Vec<_>>();
    samples.sort_by(|a, b| b.num_publications.cmp(&a.num_publications));
    samples
}

pub fn provenance_chains(
    inventory: &InventoryTable,
    assays: &[AssayRecord],
    publications: &[Publication],
) -> Vec<ProvenanceChain> {
    let stats = study_stats(inventory);
    let mut publications_by_study: HashMap<String, Vec<&Publication>> = HashMap::new();
    for (publication, code) in assigned_publications(publications) {
        publications_by_study
            .entry(code.to_string())
            .or_default()
            .push(publication);
    }

    let empty = StudyStats::default();
    assays
        .iter()
        .filter_map(|assay| {
            let code = assay.study()?;
            let study = stats.get(code.as_str()).unwrap_or(&empty);
            let publications = publications_by_study
                .get(code.as_str())
                .map(|found| {
                    found
                        .iter()
                        .map(|publication| PublicationRef {
                            title: truncate_chars(publication.title_or_unknown(), 80),
                            year: publication.year_label(),
                            pmid: publication.pmid_label(),
                            journal: publication
                                .journal
                                .clone()
                                .unwrap_or_else(|| "Unknown".to_string()),
                        })
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            Some(ProvenanceChain {
                study_code: code.to_string(),
                collection: CollectionSummary {
                    total_samples_collected: study.samples.len(),
                    participants: study.participants,
                    sample_types: study.limited_sample_types(),
                },
                assay: AssaySummary {
                    assay_type: assay.assay_type.clone(),
                    samples_assayed: assay.sample_count,
                    subjects: assay.subject_range.clone(),
                    timepoints: assay.timepoints.clone(),
                    data_key: assay.data_key.clone(),
                },
                num_publications: publications.len(),
                publications,
            })
        })
        .collect()
}

pub fn study_cross_reference(
    inventory: &InventoryTable,
    publications: &[Publication],
    assays: &[AssayRecord],
) -> Vec<StudyCrossReference> {
    let stats = study_stats(inventory);
    let by_study = assays_by_study(assays);
    let mut publication_counts: HashMap<String, usize> = HashMap::new();
    for (_, code) in assigned_publications(publications) {
        *publication_counts.entry(code.to_string()).or_default() += 1;
    }

    inventory
        .study_codes_in_order()
        .into_iter()
        .map(|code| {
            let study = stats.get(&code).cloned().unwrap_or_default();
            let study_assays = by_study.get(code.as_str()).cloned().unwrap_or_default();
            StudyCrossReference {
                total_samples: study.samples.len(),
                participants: study.participants,
                sample_types: study.sample_types.len(),
                assays_performed: study_assays.len(),
                unique_assay_types: study_assays
                    .iter()
                    .map(|assay| assay.assay_type.as_str())
                    .collect::<HashSet<_>>()
                    .len(),
                total_assay_samples: study_assays.iter().map(|assay| assay.sample_count).sum(),
                publications: publication_counts.get(&code).copied().unwrap_or(0),
                samples_available: study.samples.iter().filter(|row| row.is_available).count(),
                samples_transferred: study
                    .samples
                    .iter()
                    .filter(|row| row.is_transferred)
                    .count(),
                study_code: code,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct LinkageSet {
    pub publication_study: Vec<PublicationStudyLink>,
    pub publication_assay: Vec<PublicationAssayLink>,
    pub sample_publication: Vec<SamplePublicationLink>,
    pub multi_use: Vec<MultiUseSample>,
    pub provenance: Vec<ProvenanceChain>,
    pub cross_reference: Vec<StudyCrossReference>,
    pub unlinked_publications: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn build_linkage(
    inventory: &InventoryTable,
    publications: &[Publication],
    assays: &[AssayRecord],
) -> LinkageSet {
    let sample_publication = map_samples_to_publications(inventory, publications);
    let multi_use = multi_use_samples(&sample_publication);
    let mut linkage = LinkageSet {
        publication_study: link_publications_to_studies(publications, inventory),
        publication_assay: link_publications_to_assays(publications, assays),
        sample_publication,
        multi_use,
        provenance: provenance_chains(inventory, assays, publications),
        cross_reference: study_cross_reference(inventory, publications, assays),
        unlinked_publications: publications
            .iter()
            .filter(|publication| publication.primary_study_code().is_none())
            .map(|publication| truncate_chars(publication.title_or_unknown(), 80))
            .collect(),
        warnings: Vec::new(),
    };

    let joins = [
        ("publication to study", linkage.publication_study.is_empty()),
        ("publication to assay", linkage.publication_assay.is_empty()),
        ("sample to publication", linkage.sample_publication.is_empty()),
    ];
    for (name, empty) in joins {
        if empty {
            tracing::warn!(join = name, "join produced no rows");
            linkage.warnings.push(format!("{name} join produced no rows"));
        }
    }
    if !linkage.unlinked_publications.is_empty() {
        linkage.warnings.push(format!(
            "{} publications have no study assignment",
            linkage.unlinked_publications.len()
        ));
    }
    linkage
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceMetadata {
    pub generation_date: String,
    pub total_chains: usize,
    pub studies_covered: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceDocument {
    pub metadata: ProvenanceMetadata,
    pub provenance_chains: Vec<ProvenanceChain>,
}

impl ProvenanceDocument {
    pub fn new(chains: &[ProvenanceChain], generated_at: &str) -> Self {
        Self {
            metadata: ProvenanceMetadata {
                generation_date: generated_at.to_string(),
                total_chains: chains.len(),
                studies_covered: chains
                    .iter()
                    .map(|chain| chain.study_code.as_str())
                    .collect::<HashSet<_>>()
                    .len(),
            },
            provenance_chains: chains.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkageMetadata {
    pub generation_date: String,
    pub total_samples: usize,
    pub total_publications: usize,
    pub total_assays: usize,
    pub studies: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiUseSummary {
    pub total_multi_use: usize,
    pub top_samples: Vec<MultiUseSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteLinkage {
    pub metadata: LinkageMetadata,
    pub publication_study_links: Vec<PublicationStudyLink>,
    pub publication_assay_links: Vec<PublicationAssayLink>,
    pub multi_use_samples_summary: MultiUseSummary,
    pub study_cross_reference: Vec<StudyCrossReference>,
    pub coverage_by_study: BTreeMap<String, usize>,
}

impl CompleteLinkage {
    pub fn new(
        linkage: &LinkageSet,
        inventory: &InventoryTable,
        publications: usize,
        assays: usize,
        generated_at: &str,
    ) -> Self {
        let mut coverage_by_study = BTreeMap::new();
        for link in &linkage.publication_study {
            *coverage_by_study.entry(link.study_code.clone()).or_default() += 1;
        }
        Self {
            metadata: LinkageMetadata {
                generation_date: generated_at.to_string(),
                total_samples: inventory.len(),
                total_publications: publications,
                total_assays: assays,
                studies: inventory.study_codes().len(),
            },
            publication_study_links: linkage.publication_study.clone(),
            publication_assay_links: linkage.publication_assay.clone(),
            multi_use_samples_summary: MultiUseSummary {
                total_multi_use: linkage.multi_use.len(),
                top_samples: linkage.multi_use.iter().take(TOP_MULTI_USE).cloned().collect(),
            },
            study_cross_reference: linkage.cross_reference.clone(),
            coverage_by_study,
        }
    }
}
