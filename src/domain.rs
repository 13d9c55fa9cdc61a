use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GlueError;

/// Durable surrogate id assigned by the metadata catalog. Allocation order is
/// monotonic, so the lexicographic order of ids doubles as a recency proxy
/// when no timestamp is available.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrcabusId(String);

impl OrcabusId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrcabusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-facing library business id, e.g. `L2401542`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LibraryId(String);

impl LibraryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LibraryId {
    type Err = GlueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(GlueError::InvalidLibraryId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// Sample modality. The catalog is an open set, so unknown values survive a
/// round trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SampleType {
    Wgs,
    Wts,
    CtDna,
    Other(String),
}

impl From<String> for SampleType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "WGS" => SampleType::Wgs,
            "WTS" => SampleType::Wts,
            "ctDNA" => SampleType::CtDna,
            _ => SampleType::Other(value),
        }
    }
}

impl From<SampleType> for String {
    fn from(value: SampleType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleType::Wgs => write!(f, "WGS"),
            SampleType::Wts => write!(f, "WTS"),
            SampleType::CtDna => write!(f, "ctDNA"),
            SampleType::Other(value) => write!(f, "{value}"),
        }
    }
}

impl FromStr for SampleType {
    type Err = GlueError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(GlueError::ConfigParse("empty sample type".to_string()));
        }
        Ok(Self::from(trimmed.to_string()))
    }
}

/// Library phenotype. Negative controls are prefix-matched on the raw catalog
/// value (`negative-control`, `negative`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Phenotype {
    Tumor,
    Normal,
    Other(String),
}

impl Phenotype {
    pub fn is_tumor(&self) -> bool {
        matches!(self, Phenotype::Tumor)
    }

    pub fn is_normal(&self) -> bool {
        matches!(self, Phenotype::Normal)
    }

    pub fn is_negative_control(&self) -> bool {
        matches!(self, Phenotype::Other(value) if value.starts_with("negative"))
    }
}

impl From<String> for Phenotype {
    fn from(value: String) -> Self {
        match value.as_str() {
            "tumor" => Phenotype::Tumor,
            "normal" => Phenotype::Normal,
            _ => Phenotype::Other(value),
        }
    }
}

impl From<Phenotype> for String {
    fn from(value: Phenotype) -> Self {
        match value {
            Phenotype::Tumor => "tumor".to_string(),
            Phenotype::Normal => "normal".to_string(),
            Phenotype::Other(value) => value,
        }
    }
}

/// Processing-class tag carried on the catalog's `workflow` field. Clinical
/// and research are the pairing-relevant classes; batch-control, control and
/// germline mark normals that only ever run the baseline alignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessingClass {
    Clinical,
    Research,
    BatchControl,
    Control,
    Germline,
    Other(String),
}

impl ProcessingClass {
    pub fn is_clinical(&self) -> bool {
        matches!(self, ProcessingClass::Clinical)
    }
}

impl From<String> for ProcessingClass {
    fn from(value: String) -> Self {
        match value.as_str() {
            "clinical" => ProcessingClass::Clinical,
            "research" => ProcessingClass::Research,
            "BatchControl" => ProcessingClass::BatchControl,
            "control" => ProcessingClass::Control,
            "germline" => ProcessingClass::Germline,
            _ => ProcessingClass::Other(value),
        }
    }
}

impl From<ProcessingClass> for String {
    fn from(value: ProcessingClass) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ProcessingClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingClass::Clinical => write!(f, "clinical"),
            ProcessingClass::Research => write!(f, "research"),
            ProcessingClass::BatchControl => write!(f, "BatchControl"),
            ProcessingClass::Control => write!(f, "control"),
            ProcessingClass::Germline => write!(f, "germline"),
            ProcessingClass::Other(value) => write!(f, "{value}"),
        }
    }
}

/// Non-owning back-reference to the subject a library belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub orcabus_id: OrcabusId,
    pub subject_id: String,
}

/// Immutable snapshot of a library record as served by the metadata catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub orcabus_id: OrcabusId,
    pub library_id: LibraryId,
    #[serde(rename = "type")]
    pub sample_type: SampleType,
    pub phenotype: Phenotype,
    #[serde(rename = "workflow")]
    pub processing_class: ProcessingClass,
    pub subject: SubjectRef,
}

/// Natural key of one physical sequencing readset output:
/// `index.lane.instrumentRunId`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rgid(String);

impl Rgid {
    pub fn compose(index: &str, lane: u32, instrument_run_id: &str) -> Self {
        Self(format!("{index}.{lane}.{instrument_run_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rgid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadSet {
    pub orcabus_id: OrcabusId,
    pub rgid: Rgid,
}

/// Engine-computed combination of libraries that feeds one family of
/// workflows. Ephemeral: recomputed per request, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisUnit {
    Solo(Library),
    TumorNormal {
        tumor: Library,
        normal: Library,
    },
    TumorNormalRna {
        tumor_dna: Library,
        normal_dna: Library,
        tumor_rna: Library,
    },
}

impl AnalysisUnit {
    pub fn libraries(&self) -> Vec<&Library> {
        match self {
            AnalysisUnit::Solo(library) => vec![library],
            AnalysisUnit::TumorNormal { tumor, normal } => vec![tumor, normal],
            AnalysisUnit::TumorNormalRna {
                tumor_dna,
                normal_dna,
                tumor_rna,
            } => vec![tumor_dna, normal_dna, tumor_rna],
        }
    }

    pub fn library_ids(&self) -> Vec<LibraryId> {
        self.libraries()
            .into_iter()
            .map(|library| library.library_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_library_id_valid() {
        let id: LibraryId = " L2401542 ".parse().unwrap();
        assert_eq!(id.as_str(), "L2401542");
    }

    #[test]
    fn parse_library_id_invalid() {
        let err = "  ".parse::<LibraryId>().unwrap_err();
        assert_matches!(err, GlueError::InvalidLibraryId(_));
    }

    #[test]
    fn sample_type_round_trip() {
        assert_eq!(SampleType::from("WGS".to_string()), SampleType::Wgs);
        assert_eq!(SampleType::Wgs.to_string(), "WGS");
        assert_eq!(SampleType::CtDna.to_string(), "ctDNA");
        let custom = SampleType::from("MethylSeq".to_string());
        assert_eq!(custom.to_string(), "MethylSeq");
    }

    #[test]
    fn negative_control_prefix_match() {
        assert!(Phenotype::from("negative-control".to_string()).is_negative_control());
        assert!(Phenotype::from("negative".to_string()).is_negative_control());
        assert!(!Phenotype::Tumor.is_negative_control());
        assert!(!Phenotype::from("positive-control".to_string()).is_negative_control());
    }

    #[test]
    fn rgid_compose() {
        let rgid = Rgid::compose("AAGTCC+TTGGAA", 2, "250101_A01052_0123_BHABCDXX");
        assert_eq!(rgid.as_str(), "AAGTCC+TTGGAA.2.250101_A01052_0123_BHABCDXX");
    }

    #[test]
    fn library_deserializes_from_catalog_shape() {
        let library: Library = serde_json::from_str(
            r#"{
                "orcabusId": "lib.01J8ES4ZDRKAP2GSVRSP3C4H2M",
                "libraryId": "L2401542",
                "type": "WGS",
                "phenotype": "tumor",
                "workflow": "clinical",
                "subject": {
                    "orcabusId": "sbj.01J8ES4XVPZCGH41G4J8A9V3T9",
                    "subjectId": "EXT-SUBJ-001"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(library.sample_type, SampleType::Wgs);
        assert_eq!(library.phenotype, Phenotype::Tumor);
        assert_eq!(library.processing_class, ProcessingClass::Clinical);
        assert_eq!(library.subject.subject_id, "EXT-SUBJ-001");

        let round_tripped = serde_json::to_value(&library).unwrap();
        assert_eq!(round_tripped["type"], "WGS");
        assert_eq!(round_tripped["workflow"], "clinical");
    }

    #[test]
    fn orcabus_id_orders_lexicographically() {
        let older = OrcabusId::new("lib.01J8ES4ZAAAAAAAAAAAAAAAAAA");
        let newer = OrcabusId::new("lib.01J8ES4ZDRKAP2GSVRSP3C4H2M");
        assert!(newer > older);
    }
}
