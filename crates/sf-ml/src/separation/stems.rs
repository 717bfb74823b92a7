//! Stem types and output structures

use serde::{Deserialize, Serialize};

use crate::error::MlResult;
use crate::waveform::Waveform;

/// Stems produced by a vocal separation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StemType {
    /// Isolated vocal content returned by the model
    Vocals,
    /// Mixture minus vocals
    Accompaniment,
}

impl StemType {
    /// Both stems in output order
    pub const ALL: [StemType; 2] = [StemType::Vocals, StemType::Accompaniment];

    /// Get short name for file naming
    pub fn short_name(&self) -> &'static str {
        match self {
            StemType::Vocals => "vocals",
            StemType::Accompaniment => "accompaniment",
        }
    }

    /// Output file name, e.g. `vocals.wav`
    pub fn file_name(&self) -> String {
        format!("{}.wav", self.short_name())
    }
}

/// Isolated source plus the residual of the mixture
#[derive(Debug, Clone)]
pub struct StemPair {
    pub vocals: Waveform,
    pub accompaniment: Waveform,
}

impl StemPair {
    /// Derive the accompaniment by subtracting `vocals` from `mixture`
    pub fn from_isolated(mixture: &Waveform, vocals: Waveform) -> MlResult<Self> {
        let accompaniment = mixture.residual(&vocals)?;
        Ok(Self {
            vocals,
            accompaniment,
        })
    }

    /// Get a stem by type
    pub fn get(&self, stem: StemType) -> &Waveform {
        match stem {
            StemType::Vocals => &self.vocals,
            StemType::Accompaniment => &self.accompaniment,
        }
    }

    /// Iterate stems in output order
    pub fn iter(&self) -> impl Iterator<Item = (StemType, &Waveform)> {
        StemType::ALL.into_iter().map(move |stem| (stem, self.get(stem)))
    }
}
