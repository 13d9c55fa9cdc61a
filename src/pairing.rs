use tracing::debug;

use crate::config::{FamilyConfig, PairingMode};
use crate::domain::{AnalysisUnit, Library, SampleType};
use crate::domain::ProcessingClass;

/// Output of one family's selection pass. Baseline units only ever run the
/// family's baseline alignment workflow; paired units run the full family
/// workflow set.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub baseline: Vec<AnalysisUnit>,
    pub units: Vec<AnalysisUnit>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.baseline.is_empty() && self.units.is_empty()
    }
}

/// Class-consistency rule: a clinical library may only be paired with another
/// clinical library. Non-clinical classes impose no constraint on each other.
pub fn classes_consistent(a: &ProcessingClass, b: &ProcessingClass) -> bool {
    if a.is_clinical() || b.is_clinical() {
        a == b
    } else {
        true
    }
}

/// Pick the newest matching candidate from a descending-sorted candidate
/// list. Tie-break: the largest `orcabusId` wins, i.e. the first match.
pub fn newest_match<'a>(
    history: &'a [Library],
    predicate: impl Fn(&Library) -> bool,
) -> Option<&'a Library> {
    history.iter().find(|library| predicate(library))
}

pub struct PairingSelector<'a> {
    family: &'a FamilyConfig,
}

impl<'a> PairingSelector<'a> {
    pub fn new(family: &'a FamilyConfig) -> Self {
        Self { family }
    }

    /// Compute the analysis units for one subject. `request` holds the
    /// subject's libraries observed in the triggering request;
    /// `subject_history` holds every library ever registered for the subject
    /// (any order, any sample type) and is the cross-run search space.
    pub fn select(&self, request: &[Library], subject_history: &[Library]) -> Selection {
        let mut selection = Selection::default();

        // Negative controls go through the baseline alignment alone, never
        // paired, never matched across runs.
        if self.family.baseline_workflow.is_some() {
            for library in request.iter().filter(|library| {
                library.sample_type == self.family.sample_type
                    && library.phenotype.is_negative_control()
            }) {
                selection.baseline.push(AnalysisUnit::Solo(library.clone()));
            }
        }

        match self.family.pairing {
            PairingMode::TumorOnly => self.select_tumor_only(request, &mut selection),
            PairingMode::TumorNormal => {
                self.select_tumor_normal(request, subject_history, &mut selection)
            }
            PairingMode::TumorNormalRna => {
                self.select_tumor_normal_rna(request, subject_history, &mut selection)
            }
        }

        debug!(
            family = %self.family.name,
            baseline = selection.baseline.len(),
            units = selection.units.len(),
            "pairing selection complete"
        );
        selection
    }

    fn select_tumor_only(&self, request: &[Library], selection: &mut Selection) {
        for tumor in request.iter().filter(|library| {
            library.sample_type == self.family.sample_type && library.phenotype.is_tumor()
        }) {
            selection.units.push(AnalysisUnit::Solo(tumor.clone()));
        }
    }

    fn select_tumor_normal(
        &self,
        request: &[Library],
        subject_history: &[Library],
        selection: &mut Selection,
    ) {
        let tumors = self.request_tumors(request, &self.family.sample_type);
        let normals = self.pool_normals(request, &self.family.sample_type, selection);

        if tumors.is_empty() && normals.is_empty() {
            return;
        }

        let history = self.history_of_type(subject_history, &self.family.sample_type);
        if !history.iter().any(|library| library.phenotype.is_tumor())
            || !history.iter().any(|library| self.normal_candidate(library))
        {
            debug!(family = %self.family.name, "subject has no cross-run tumor/normal pair");
            return;
        }

        // Tumors only: backfill the newest class-consistent normal per tumor.
        if normals.is_empty() {
            for tumor in &tumors {
                let Some(normal) = newest_match(&history, |library| {
                    self.normal_candidate(library)
                        && classes_consistent(&library.processing_class, &tumor.processing_class)
                }) else {
                    continue;
                };
                selection.units.push(AnalysisUnit::TumorNormal {
                    tumor: tumor.clone(),
                    normal: normal.clone(),
                });
            }
            return;
        }

        // Normals only: a single normal backfills the newest tumor.
        if tumors.is_empty() {
            if normals.len() > 1 {
                debug!(family = %self.family.name, "multiple normals on one run, aborting");
                return;
            }
            let normal = &normals[0];
            let Some(tumor) = newest_match(&history, |library| {
                library.phenotype.is_tumor()
                    && classes_consistent(&library.processing_class, &normal.processing_class)
            }) else {
                return;
            };
            selection.units.push(AnalysisUnit::TumorNormal {
                tumor: tumor.clone(),
                normal: normal.clone(),
            });
            return;
        }

        // Both present: each tumor pairs with the single in-run normal.
        if normals.len() > 1 {
            debug!(family = %self.family.name, "multiple normals on one run, aborting");
            return;
        }
        let normal = &normals[0];
        for tumor in &tumors {
            if !classes_consistent(&tumor.processing_class, &normal.processing_class) {
                continue;
            }
            selection.units.push(AnalysisUnit::TumorNormal {
                tumor: tumor.clone(),
                normal: normal.clone(),
            });
        }
    }

    fn select_tumor_normal_rna(
        &self,
        request: &[Library],
        subject_history: &[Library],
        selection: &mut Selection,
    ) {
        let Some(rna_type) = self.family.rna_sample_type.clone() else {
            return;
        };

        let tumors = self.request_tumors(request, &self.family.sample_type);
        let normals = self.pool_normals(request, &self.family.sample_type, selection);
        let rna_tumors = self.request_tumors(request, &rna_type);

        if tumors.is_empty() && normals.is_empty() && rna_tumors.is_empty() {
            return;
        }

        let dna_history = self.history_of_type(subject_history, &self.family.sample_type);
        let rna_history = self.history_of_type(subject_history, &rna_type);
        if !dna_history.iter().any(|library| library.phenotype.is_tumor())
            || !dna_history.iter().any(|library| self.normal_candidate(library))
            || !rna_history.iter().any(|library| library.phenotype.is_tumor())
        {
            debug!(family = %self.family.name, "subject has no cross-run DNA/RNA trio");
            return;
        }

        // RNA only: backfill both DNA slots per RNA tumor.
        if tumors.is_empty() && normals.is_empty() {
            for rna in &rna_tumors {
                let Some(unit) = self.backfill_dna(rna, &dna_history) else {
                    continue;
                };
                selection.units.push(unit);
            }
            return;
        }

        // DNA only: run the tumor/normal cases, backfilling the RNA slot.
        if rna_tumors.is_empty() {
            if normals.is_empty() {
                for tumor in &tumors {
                    let Some(normal) = newest_match(&dna_history, |library| {
                        self.normal_candidate(library)
                            && classes_consistent(
                                &library.processing_class,
                                &tumor.processing_class,
                            )
                    }) else {
                        continue;
                    };
                    let Some(unit) = self.backfill_rna(tumor, normal, &rna_history) else {
                        continue;
                    };
                    selection.units.push(unit);
                }
                return;
            }

            if normals.len() > 1 {
                debug!(family = %self.family.name, "multiple normals on one run, aborting");
                return;
            }
            let normal = &normals[0];

            if tumors.is_empty() {
                let Some(tumor) = newest_match(&dna_history, |library| {
                    library.phenotype.is_tumor()
                        && classes_consistent(&library.processing_class, &normal.processing_class)
                }) else {
                    return;
                };
                if let Some(unit) = self.backfill_rna(tumor, normal, &rna_history) {
                    selection.units.push(unit);
                }
                return;
            }

            for tumor in &tumors {
                if !classes_consistent(&tumor.processing_class, &normal.processing_class) {
                    continue;
                }
                let Some(unit) = self.backfill_rna(tumor, normal, &rna_history) else {
                    continue;
                };
                selection.units.push(unit);
            }
            return;
        }

        // Both modalities present.
        if tumors.is_empty() && !normals.is_empty() {
            if normals.len() > 1 {
                debug!(family = %self.family.name, "multiple normals on one run, aborting");
                return;
            }
            let normal = &normals[0];
            for rna in &rna_tumors {
                if !classes_consistent(&rna.processing_class, &normal.processing_class) {
                    continue;
                }
                let Some(tumor) = newest_match(&dna_history, |library| {
                    library.phenotype.is_tumor()
                        && classes_consistent(&library.processing_class, &normal.processing_class)
                        && classes_consistent(&library.processing_class, &rna.processing_class)
                }) else {
                    continue;
                };
                selection.units.push(AnalysisUnit::TumorNormalRna {
                    tumor_dna: tumor.clone(),
                    normal_dna: normal.clone(),
                    tumor_rna: rna.clone(),
                });
            }
            return;
        }

        if normals.is_empty() {
            // Tumor DNA plus RNA in the request: backfill the normal per pair.
            for tumor in &tumors {
                for rna in &rna_tumors {
                    if !classes_consistent(&tumor.processing_class, &rna.processing_class) {
                        continue;
                    }
                    let Some(normal) = newest_match(&dna_history, |library| {
                        self.normal_candidate(library)
                            && classes_consistent(
                                &library.processing_class,
                                &tumor.processing_class,
                            )
                            && classes_consistent(&library.processing_class, &rna.processing_class)
                    }) else {
                        continue;
                    };
                    selection.units.push(AnalysisUnit::TumorNormalRna {
                        tumor_dna: tumor.clone(),
                        normal_dna: normal.clone(),
                        tumor_rna: rna.clone(),
                    });
                }
            }
            return;
        }

        if normals.len() > 1 {
            debug!(family = %self.family.name, "multiple normals on one run, aborting");
            return;
        }
        let normal = &normals[0];
        for tumor in &tumors {
            for rna in &rna_tumors {
                let consistent = classes_consistent(&tumor.processing_class, &rna.processing_class)
                    && classes_consistent(&tumor.processing_class, &normal.processing_class)
                    && classes_consistent(&rna.processing_class, &normal.processing_class);
                if !consistent {
                    continue;
                }
                selection.units.push(AnalysisUnit::TumorNormalRna {
                    tumor_dna: tumor.clone(),
                    normal_dna: normal.clone(),
                    tumor_rna: rna.clone(),
                });
            }
        }
    }

    fn backfill_dna(&self, rna: &Library, dna_history: &[Library]) -> Option<AnalysisUnit> {
        let tumor = newest_match(dna_history, |library| {
            library.phenotype.is_tumor()
                && classes_consistent(&library.processing_class, &rna.processing_class)
        })?;
        let normal = newest_match(dna_history, |library| {
            self.normal_candidate(library)
                && classes_consistent(&library.processing_class, &tumor.processing_class)
                && classes_consistent(&library.processing_class, &rna.processing_class)
        })?;
        Some(AnalysisUnit::TumorNormalRna {
            tumor_dna: tumor.clone(),
            normal_dna: normal.clone(),
            tumor_rna: rna.clone(),
        })
    }

    fn backfill_rna(
        &self,
        tumor: &Library,
        normal: &Library,
        rna_history: &[Library],
    ) -> Option<AnalysisUnit> {
        let rna = newest_match(rna_history, |library| {
            library.phenotype.is_tumor()
                && classes_consistent(&library.processing_class, &tumor.processing_class)
                && classes_consistent(&library.processing_class, &normal.processing_class)
        })?;
        Some(AnalysisUnit::TumorNormalRna {
            tumor_dna: tumor.clone(),
            normal_dna: normal.clone(),
            tumor_rna: rna.clone(),
        })
    }

    fn request_tumors(&self, request: &[Library], sample_type: &SampleType) -> Vec<Library> {
        request
            .iter()
            .filter(|library| &library.sample_type == sample_type && library.phenotype.is_tumor())
            .cloned()
            .collect()
    }

    /// Request normals that stay in the pairing pool. Germline-only normals
    /// (batch controls etc.) become solo baseline units and are removed.
    fn pool_normals(
        &self,
        request: &[Library],
        sample_type: &SampleType,
        selection: &mut Selection,
    ) -> Vec<Library> {
        let mut normals = Vec::new();
        for library in request
            .iter()
            .filter(|library| &library.sample_type == sample_type && library.phenotype.is_normal())
        {
            if self.family.is_germline_only(&library.processing_class) {
                if self.family.baseline_workflow.is_some() {
                    selection.baseline.push(AnalysisUnit::Solo(library.clone()));
                }
            } else {
                normals.push(library.clone());
            }
        }
        normals
    }

    /// Historical candidates of a sample type, newest first. Germline-only
    /// classes are excluded from normal candidacy via [`Self::normal_candidate`],
    /// not here, so the tumor search still sees the full set.
    fn history_of_type(&self, subject_history: &[Library], sample_type: &SampleType) -> Vec<Library> {
        let mut history: Vec<Library> = subject_history
            .iter()
            .filter(|library| &library.sample_type == sample_type)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.orcabus_id.cmp(&a.orcabus_id));
        history
    }

    fn normal_candidate(&self, library: &Library) -> bool {
        library.phenotype.is_normal() && !self.family.is_germline_only(&library.processing_class)
    }
}
