// TemplateStore - calibrated reference waveforms per drum class
//
// Holds at most one template per class. Calibration is the only writer and
// detection the only reader; the engine never runs both in the same tick.

use crate::calibration::progress::DrumClass;
use crate::error::CalibrationError;

/// Which classes currently have a template
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TemplateFlags {
    pub kick: bool,
    pub snare: bool,
    pub hihat: bool,
}

impl TemplateFlags {
    pub fn any(&self) -> bool {
        self.kick || self.snare || self.hihat
    }
}

/// Storage for up to three calibrated templates
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    templates: [Option<Vec<f32>>; 3],
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or overwrite) the template for `class`
    ///
    /// Content validity is the caller's job; only emptiness is rejected.
    pub fn set(&mut self, class: DrumClass, samples: Vec<f32>) -> Result<(), CalibrationError> {
        if samples.is_empty() {
            return Err(CalibrationError::EmptyTemplate { class });
        }
        self.templates[class.index()] = Some(samples);
        Ok(())
    }

    /// Template for `class`, if calibrated
    pub fn get(&self, class: DrumClass) -> Option<&[f32]> {
        self.templates[class.index()].as_deref()
    }

    pub fn has(&self, class: DrumClass) -> bool {
        self.templates[class.index()].is_some()
    }

    pub fn has_any(&self) -> bool {
        self.templates.iter().any(Option::is_some)
    }

    pub fn flags(&self) -> TemplateFlags {
        TemplateFlags {
            kick: self.has(DrumClass::Kick),
            snare: self.has(DrumClass::Snare),
            hihat: self.has(DrumClass::HiHat),
        }
    }

    /// Iterate populated templates in calibration order
    pub fn populated(&self) -> impl Iterator<Item = (DrumClass, &[f32])> + '_ {
        DrumClass::ALL
            .into_iter()
            .filter_map(move |class| self.get(class).map(|samples| (class, samples)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = TemplateStore::new();
        assert!(!store.has_any());
        assert!(store.get(DrumClass::Kick).is_none());
        assert_eq!(store.flags(), TemplateFlags::default());
        assert_eq!(store.populated().count(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut store = TemplateStore::new();
        store.set(DrumClass::Snare, vec![0.1, -0.2, 0.3]).unwrap();

        assert!(store.has_any());
        assert_eq!(store.get(DrumClass::Snare), Some(&[0.1, -0.2, 0.3][..]));
        assert!(store.get(DrumClass::Kick).is_none());

        let flags = store.flags();
        assert!(!flags.kick);
        assert!(flags.snare);
        assert!(!flags.hihat);
    }

    #[test]
    fn test_overwrite_keeps_single_template_per_class() {
        let mut store = TemplateStore::new();
        store.set(DrumClass::Kick, vec![1.0; 4]).unwrap();
        store.set(DrumClass::Kick, vec![0.5; 2]).unwrap();

        assert_eq!(store.get(DrumClass::Kick), Some(&[0.5, 0.5][..]));
        assert_eq!(store.populated().count(), 1);
    }

    #[test]
    fn test_reject_empty_template() {
        let mut store = TemplateStore::new();
        let result = store.set(DrumClass::HiHat, Vec::new());
        assert_eq!(
            result,
            Err(CalibrationError::EmptyTemplate {
                class: DrumClass::HiHat
            })
        );
        assert!(!store.has_any());
    }

    #[test]
    fn test_populated_order() {
        let mut store = TemplateStore::new();
        store.set(DrumClass::HiHat, vec![0.3]).unwrap();
        store.set(DrumClass::Kick, vec![0.1]).unwrap();

        let classes: Vec<DrumClass> = store.populated().map(|(class, _)| class).collect();
        assert_eq!(classes, vec![DrumClass::Kick, DrumClass::HiHat]);
        assert!(!store.has(DrumClass::Snare));
    }
}
