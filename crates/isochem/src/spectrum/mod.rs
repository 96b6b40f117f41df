//! Isotopic mass spectra, calculated by convolving the natural isotope distributions of every element in a composition

mod distribution;
pub mod errors;

// Standard Library Imports
use std::fmt::{self, Display, Formatter};

// External Crate Imports
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, trace};

// Local Crate Imports
use self::{
    distribution::{Budget, Distribution},
    errors::SpectrumError,
};
use crate::{
    Charge, Charged, Composition, MergeLabel, MonoisotopicMass, NominalMass, SpectrumConfig,
    composition::records::precision_digits,
};

// Public API ==========================================================================================================

/// A single peak of an isotopic mass spectrum
#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct SpectrumPeak {
    /// The nominal mass of the peak (or of one of its members, for merged peaks)
    pub nominal_mass: NominalMass,
    /// The probability-weighted mean mass of every isotope combination in this peak
    pub mass: Decimal,
    /// The probability of a molecule falling into this peak, between 0 and 1
    pub fraction: Decimal,
    /// The height of this peak as a percentage of the tallest peak
    pub intensity: Decimal,
    pub mz: Decimal,
}

#[derive(Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Spectrum {
    peaks: Vec<SpectrumPeak>,
    total_probability: Decimal,
    charge: Charge,
}

impl Spectrum {
    /// Calculates the isotopic spectrum of a composition, with every peak sorted by mass
    ///
    /// # Errors
    ///
    /// Fails if any count isn't a whole number, or if the calculation exceeds the budget set in `config`
    pub fn compute(
        composition: &Composition,
        config: &SpectrumConfig,
    ) -> Result<Self, SpectrumError> {
        let exponents = composition
            .atoms()
            .iter()
            .map(|(element, count)| {
                count
                    .to_u64()
                    .map(|exponent| (element, exponent))
                    .ok_or_else(|| SpectrumError::FractionalCount {
                        element: element.to_string(),
                        count: (*count).into(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let budget = Budget::start(config);
        let mut distribution = Distribution::certain();
        for (element, exponent) in exponents {
            let atoms = Distribution::of_element(element).power(exponent, &budget)?;
            distribution = distribution.convolve(&atoms, &budget)?;
            trace!(%element, bins = distribution.len(), "convolved element into spectrum");
        }
        let total_probability = distribution.total_probability();

        let merged = merge(&distribution, config);
        let tallest = merged
            .iter()
            .map(|peak| peak.probability)
            .max()
            .unwrap_or_default();

        let charge = composition.charge();
        let electron_mass = composition.electron_mass();
        let peaks: Vec<_> = merged
            .into_iter()
            .map(|peak| {
                let intensity = if tallest.is_zero() {
                    Decimal::ZERO
                } else {
                    peak.probability / tallest * Decimal::ONE_HUNDRED
                };
                SpectrumPeak {
                    nominal_mass: NominalMass(peak.nominal_mass),
                    mass: peak.mass,
                    fraction: peak.probability,
                    intensity,
                    mz: MonoisotopicMass(peak.mass).to_mz(charge, electron_mass).into(),
                }
            })
            .filter(|peak| peak.intensity >= config.min_intensity)
            .collect();
        debug!(formula = %composition, peaks = peaks.len(), "calculated isotopic spectrum");

        Ok(Self {
            peaks,
            total_probability,
            charge,
        })
    }

    /// Every peak that survived merging and pruning, lightest first
    #[must_use]
    pub fn peaks(&self) -> &[SpectrumPeak] {
        &self.peaks
    }

    /// The probability covered by the distribution before any peaks were dropped, which stays close to one unless
    /// `min_fraction` pruning discarded a meaningful amount
    #[must_use]
    pub const fn total_probability(&self) -> Decimal {
        self.total_probability
    }

    /// The most abundant peak
    #[must_use]
    pub fn peak(&self) -> Option<&SpectrumPeak> {
        self.peaks
            .iter()
            .reduce(|best, peak| if peak.fraction > best.fraction { peak } else { best })
    }

    /// The mean mass of the reported peaks, weighted by their fractions
    #[must_use]
    pub fn mean(&self) -> Decimal {
        self.peaks.iter().map(|peak| peak.mass * peak.fraction).sum()
    }

    /// The nominal masses of the lightest and heaviest peaks
    #[must_use]
    pub fn range(&self) -> Option<(NominalMass, NominalMass)> {
        let nominal_masses = self.peaks.iter().map(|peak| peak.nominal_mass);
        nominal_masses.clone().min().zip(nominal_masses.max())
    }
}

// Private Helper Functions ============================================================================================

struct MergedPeak {
    nominal_mass: u64,
    mass: Decimal,
    probability: Decimal,
    label_probability: Decimal,
}

/// Greedily merges neighbouring bins whose masses are closer than `config.merge_tolerance`
fn merge(distribution: &Distribution, config: &SpectrumConfig) -> Vec<MergedPeak> {
    let mut bins: Vec<_> = distribution
        .bins()
        .map(|(nominal_mass, bin)| (nominal_mass, bin.mass(), bin.probability))
        .collect();
    bins.sort_by(|(_, a, _), (_, b, _)| a.cmp(b));

    let mut peaks: Vec<MergedPeak> = Vec::with_capacity(bins.len());
    for (nominal_mass, mass, probability) in bins {
        match peaks.last_mut() {
            Some(peak) if mass - peak.mass < config.merge_tolerance => {
                let total = peak.probability + probability;
                peak.mass = (peak.mass * peak.probability + mass * probability) / total;
                peak.probability = total;
                let most_probable = probability > peak.label_probability;
                if config.merge_label == MergeLabel::MostProbable && most_probable {
                    peak.nominal_mass = nominal_mass;
                    peak.label_probability = probability;
                }
            }
            _ => peaks.push(MergedPeak {
                nominal_mass,
                mass,
                probability,
                label_probability: probability,
            }),
        }
    }
    peaks
}

// Trait Implementations ===============================================================================================

impl Charged for Spectrum {
    fn charge(&self) -> Charge {
        self.charge
    }
}

impl Display for Spectrum {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let charged = !self.charge.is_zero();
        write!(f, "{:<13}   {:>11}   {:>12}", "Relative mass", "Fraction %", "Intensity")?;
        if charged {
            write!(f, "   {:>12}", "m/z")?;
        }
        for peak in &self.peaks {
            let precision = precision_digits(peak.mass, 9) as usize;
            let fraction = (peak.fraction * Decimal::ONE_HUNDRED).round_dp(6);
            let intensity = peak.intensity.round_dp(6);
            write!(
                f,
                "\n{:<13.precision$}   {fraction:>11.6}   {intensity:>12.6}",
                peak.mass.round_dp(precision as u32)
            )?;
            if charged {
                write!(f, "   {:>12.precision$}", peak.mz.round_dp(precision as u32))?;
            }
        }
        Ok(())
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use indoc::indoc;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{AtomicDatabase, ComputationBudget, spectrum::errors::ComputationLimitError};

    static DB: LazyLock<AtomicDatabase> = LazyLock::new(AtomicDatabase::default);

    fn spectrum(formula: &str, config: &SpectrumConfig) -> Spectrum {
        Composition::new(&DB, formula)
            .unwrap()
            .spectrum(config)
            .unwrap()
    }

    fn every_peak() -> SpectrumConfig {
        SpectrumConfig::default().with_min_intensity(Decimal::ZERO)
    }

    fn summary(spectrum: &Spectrum) -> Vec<(u64, Decimal, Decimal)> {
        spectrum
            .peaks()
            .iter()
            .map(|peak| {
                (
                    peak.nominal_mass.into(),
                    peak.mass.round_dp(4),
                    (peak.fraction * Decimal::ONE_HUNDRED).round_dp(6),
                )
            })
            .collect()
    }

    #[test]
    fn hydrogen_spectra() {
        assert_eq!(
            summary(&spectrum("H", &every_peak())),
            [(1, dec!(1.0078), dec!(99.9885)), (2, dec!(2.0141), dec!(0.0115))]
        );
        assert_eq!(
            summary(&spectrum("H2", &every_peak())),
            [
                (2, dec!(2.0157), dec!(99.977001)),
                (3, dec!(3.0219), dec!(0.022997)),
                (4, dec!(4.0282), dec!(0.000001)),
            ]
        );
        // The default intensity cutoff drops the 2H2 peak
        assert_eq!(spectrum("H2", &SpectrumConfig::default()).peaks().len(), 2);
    }

    #[test]
    fn labelled_spectra() {
        assert_eq!(
            summary(&spectrum("D", &every_peak())),
            [(2, dec!(2.0141), dec!(100))]
        );
        assert_eq!(
            summary(&spectrum("DHO", &every_peak())),
            [
                (19, dec!(19.0168), dec!(99.745528)),
                (20, dec!(20.0215), dec!(0.049468)),
                (21, dec!(21.0211), dec!(0.204981)),
                (22, dec!(22.0274), dec!(0.000024)),
            ]
        );
    }

    #[test]
    fn caffeine_spectrum() {
        let caffeine = spectrum("C8H10N4O2", &SpectrumConfig::default());
        let peak = caffeine.peak().unwrap();
        assert_eq!(peak.nominal_mass, NominalMass(194));
        assert_eq!(peak.mass.round_dp(2), dec!(194.08));
        assert_eq!(peak.intensity, Decimal::ONE_HUNDRED);
        assert_eq!(caffeine.range().unwrap().0, NominalMass(194));
        assert!((caffeine.total_probability() - Decimal::ONE).abs() < dec!(1e-12));
        assert!(caffeine.mean() > peak.mass);
        // Peaks come out sorted by mass
        assert!(caffeine.peaks().windows(2).all(|w| w[0].mass < w[1].mass));
    }

    #[test]
    fn fractional_counts() {
        let rust = Composition::new(&DB, "Fe0.95O").unwrap();
        let error = rust.spectrum(&SpectrumConfig::default()).unwrap_err();
        assert_eq!(
            error,
            SpectrumError::FractionalCount {
                element: "Fe".to_owned(),
                count: dec!(0.95)
            }
        );
        assert_eq!(
            error.to_string(),
            "the formula contains 0.95 Fe atoms, which is not a whole number"
        );
    }

    #[test]
    fn computation_limits() {
        let budget = ComputationBudget::default().with_max_bins(10);
        let config = SpectrumConfig::default().with_budget(budget);
        let error = Composition::new(&DB, "C100")
            .unwrap()
            .spectrum(&config)
            .unwrap_err();
        assert_eq!(
            error,
            SpectrumError::Limit(ComputationLimitError::Bins {
                bins: 17,
                max_bins: 10
            })
        );
        // Small formulas still fit
        assert_eq!(spectrum("H2", &config).peaks().len(), 2);
    }

    #[test]
    fn merging_peaks() {
        let merged = spectrum("H2", &every_peak().with_merge_tolerance(dec!(1.5)));
        let peaks = merged.peaks();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].nominal_mass, NominalMass(2));
        assert_eq!(
            peaks[0].fraction,
            dec!(0.999770013225) + dec!(0.00022997355)
        );
        assert!(peaks[0].mass > dec!(2.0157) && peaks[0].mass < dec!(2.0160));

        // Boron-11 is more abundant than boron-10, so it labels the merged peak unless told otherwise
        let config = every_peak().with_merge_tolerance(dec!(1.5));
        let boron = spectrum("B", &config);
        assert_eq!(boron.peaks().len(), 1);
        assert_eq!(boron.peaks()[0].nominal_mass, NominalMass(11));
        assert_eq!(boron.peaks()[0].fraction, Decimal::ONE);
        let boron = spectrum("B", &config.with_merge_label(MergeLabel::Lightest));
        assert_eq!(boron.peaks()[0].nominal_mass, NominalMass(10));
    }

    #[test]
    fn intensity_pruning_is_monotonic() {
        let mut previous: Option<Vec<NominalMass>> = None;
        for min_intensity in [dec!(0), dec!(0.01), dec!(0.1), dec!(1), dec!(10), dec!(100)] {
            let config = SpectrumConfig::default().with_min_intensity(min_intensity);
            let peaks: Vec<_> = spectrum("C8H10N4O2", &config)
                .peaks()
                .iter()
                .map(|peak| peak.nominal_mass)
                .collect();
            if let Some(previous) = previous {
                assert!(peaks.iter().all(|peak| previous.contains(peak)));
            }
            previous = Some(peaks);
        }
        assert_eq!(previous.unwrap(), [NominalMass(194)]);
    }

    #[test]
    fn mass_to_charge_ratios() {
        let sulfate = spectrum("SO4_2-", &SpectrumConfig::default());
        assert_eq!(sulfate.charge(), Charge(-2));
        let peak = sulfate.peak().unwrap();
        assert_eq!(peak.mz.round_dp(10), dec!(47.9764134062));
        let water = spectrum("H2O", &SpectrumConfig::default());
        assert_eq!(water.peaks()[0].mz, water.peaks()[0].mass);
    }

    #[test]
    fn spectrum_display() {
        assert_eq!(
            spectrum("H", &every_peak()).to_string(),
            indoc! {"
                Relative mass    Fraction %      Intensity
                1.0078250         99.988500     100.000000
                2.0141018          0.011500       0.011501"
            }
        );
        let hydronium = spectrum("H+", &SpectrumConfig::default()).to_string();
        assert!(hydronium.starts_with("Relative mass    Fraction %      Intensity            m/z"));
        assert!(hydronium.contains("1.0072765"));
    }
}
