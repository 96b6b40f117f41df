// Standard Library Imports
use std::time::{Duration, Instant};

// External Crate Imports
use rust_decimal::Decimal;
use tracing::{trace, warn};

// Local Crate Imports
use super::errors::ComputationLimitError;
use crate::{Element, SpectrumConfig};

/// Every combination of isotopes sharing a single nominal mass
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub(crate) struct Bin {
    pub(crate) probability: Decimal,
    /// The mass of every combination in this bin, weighted by how probable that combination is
    pub(crate) weighted_mass: Decimal,
}

impl Bin {
    const EMPTY: Self = Self {
        probability: Decimal::ZERO,
        weighted_mass: Decimal::ZERO,
    };

    /// The probability-weighted mean mass of the bin, or zero for empty bins
    pub(crate) fn mass(&self) -> Decimal {
        if self.probability.is_zero() {
            Decimal::ZERO
        } else {
            self.weighted_mass / self.probability
        }
    }
}

/// A dense distribution of probability over consecutive nominal masses, starting from `offset`
#[derive(Clone, Eq, PartialEq, Debug)]
pub(crate) struct Distribution {
    offset: u64,
    // NOTE: Never empty
    bins: Vec<Bin>,
}

impl Distribution {
    /// The distribution of nothing at all: a single, certain bin with no mass
    pub(crate) fn certain() -> Self {
        Self {
            offset: 0,
            bins: vec![Bin {
                probability: Decimal::ONE,
                weighted_mass: Decimal::ZERO,
            }],
        }
    }

    /// The natural isotope distribution of a single atom, or a single certain bin for labelled isotopes
    pub(crate) fn of_element(element: &Element) -> Self {
        let isotopes: Vec<_> = if element.mass_number().is_some() {
            let isotope = element.principal_isotope();
            vec![(isotope.mass_number().get(), Decimal::ONE, isotope.relative_mass())]
        } else {
            element
                .isotope_distribution()
                .into_iter()
                .map(|i| (i.mass_number().get(), i.abundance(), i.relative_mass()))
                .collect()
        };

        // SAFETY: Validation of the `AtomicDatabase` ensures every element has at least one naturally abundant isotope
        let lightest = isotopes.iter().map(|&(a, ..)| a).min().unwrap();
        let heaviest = isotopes.iter().map(|&(a, ..)| a).max().unwrap();

        let mut bins = vec![Bin::EMPTY; (heaviest - lightest) as usize + 1];
        for (mass_number, abundance, mass) in isotopes {
            bins[(mass_number - lightest) as usize] = Bin {
                probability: abundance,
                weighted_mass: abundance * mass,
            };
        }

        Self {
            offset: u64::from(lightest),
            bins,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bins.len()
    }

    /// The distribution of two independent distributions combined
    pub(crate) fn convolve(
        &self,
        other: &Self,
        budget: &Budget,
    ) -> Result<Self, ComputationLimitError> {
        let len = self.bins.len() + other.bins.len() - 1;
        budget.check_bins(len)?;

        let mut bins = vec![Bin::EMPTY; len];
        for (i, x) in occupied(&self.bins) {
            for (j, y) in occupied(&other.bins) {
                let bin = &mut bins[i + j];
                bin.probability += x.probability * y.probability;
                bin.weighted_mass +=
                    x.weighted_mass * y.probability + y.weighted_mass * x.probability;
            }
            budget.check_time()?;
        }

        // NOTE: Resolution guarantees total nominal masses fit in a `u64`, and offsets never exceed them
        let mut distribution = Self {
            offset: self.offset + other.offset,
            bins,
        };
        if let Some(min_fraction) = budget.min_fraction {
            distribution.prune(min_fraction);
        }
        Ok(distribution)
    }

    /// This distribution convolved with itself `exponent` times, by repeated squaring
    pub(crate) fn power(
        &self,
        mut exponent: u64,
        budget: &Budget,
    ) -> Result<Self, ComputationLimitError> {
        let mut result = Self::certain();
        let mut base = self.clone();
        while exponent > 0 {
            if exponent & 1 == 1 {
                result = result.convolve(&base, budget)?;
            }
            exponent >>= 1;
            if exponent > 0 {
                base = base.convolve(&base, budget)?;
            }
        }
        trace!(bins = result.len(), "raised distribution to a power");
        Ok(result)
    }

    /// Empties bins less probable than `min_fraction`, then trims empty bins from either end. The most probable bin
    /// always survives.
    fn prune(&mut self, min_fraction: Decimal) {
        let most_probable = self
            .bins
            .iter()
            .map(|bin| bin.probability)
            .max()
            .unwrap_or_default();
        let threshold = min_fraction.min(most_probable);
        for bin in &mut self.bins {
            if bin.probability < threshold {
                *bin = Bin::EMPTY;
            }
        }

        let first = self.bins.iter().position(|bin| !bin.probability.is_zero());
        let last = self.bins.iter().rposition(|bin| !bin.probability.is_zero());
        if let (Some(first), Some(last)) = (first, last) {
            self.bins.truncate(last + 1);
            self.bins.drain(..first);
            self.offset += first as u64;
        }
    }

    /// Every non-empty bin, along with its nominal mass
    pub(crate) fn bins(&self) -> impl Iterator<Item = (u64, Bin)> + '_ {
        occupied(&self.bins).map(|(i, &bin)| (self.offset + i as u64, bin))
    }

    pub(crate) fn total_probability(&self) -> Decimal {
        self.bins.iter().map(|bin| bin.probability).sum()
    }
}

fn occupied(bins: &[Bin]) -> impl Iterator<Item = (usize, &Bin)> {
    bins.iter()
        .enumerate()
        .filter(|(_, bin)| !bin.probability.is_zero())
}

// ---------------------------------------------------------------------------------------------------------------------

/// Tracks the limits of a single spectrum calculation
#[derive(Copy, Clone, Debug)]
pub(crate) struct Budget {
    max_bins: usize,
    max_duration: Option<Duration>,
    min_fraction: Option<Decimal>,
    started: Instant,
}

impl Budget {
    pub(crate) fn start(config: &SpectrumConfig) -> Self {
        Self {
            max_bins: config.budget.max_bins,
            max_duration: config.budget.max_duration,
            min_fraction: config.min_fraction,
            started: Instant::now(),
        }
    }

    fn check_bins(&self, bins: usize) -> Result<(), ComputationLimitError> {
        if bins > self.max_bins {
            warn!(bins, max_bins = self.max_bins, "isotope distribution exceeded the bin limit");
            return Err(ComputationLimitError::Bins {
                bins,
                max_bins: self.max_bins,
            });
        }
        Ok(())
    }

    fn check_time(&self) -> Result<(), ComputationLimitError> {
        if let Some(limit) = self.max_duration {
            let elapsed = self.started.elapsed();
            if elapsed >= limit {
                warn!(?elapsed, ?limit, "isotope distribution exceeded the time limit");
                return Err(ComputationLimitError::Duration { limit });
            }
        }
        Ok(())
    }
}

// Module Tests ========================================================================================================

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::{AtomicDatabase, ComputationBudget, MassNumber};

    static DB: LazyLock<AtomicDatabase> = LazyLock::new(AtomicDatabase::default);

    fn element(symbol: &str) -> Element<'static> {
        Element::new(&DB, symbol).unwrap()
    }

    fn unlimited() -> Budget {
        Budget::start(&SpectrumConfig::default().with_min_fraction(None))
    }

    fn summary(distribution: &Distribution) -> Vec<(u64, Decimal, Decimal)> {
        distribution
            .bins()
            .map(|(nominal, bin)| (nominal, bin.probability, bin.mass().round_dp(4)))
            .collect()
    }

    #[test]
    fn element_distributions() {
        let sulfur = Distribution::of_element(&element("S"));
        // There's no naturally occurring 35S, but it still gets an (empty) bin
        assert_eq!(sulfur.len(), 5);
        let nominal_masses: Vec<_> = sulfur.bins().map(|(nominal, _)| nominal).collect();
        assert_eq!(nominal_masses, [32, 33, 34, 36]);

        let deuterium = Element::new_isotope(&DB, "H", MassNumber::new(2).unwrap()).unwrap();
        assert_eq!(
            summary(&Distribution::of_element(&deuterium)),
            [(2, Decimal::ONE, dec!(2.0141))]
        );
    }

    #[test]
    fn convolution() {
        let hydrogen = Distribution::of_element(&element("H"));
        let h2 = hydrogen.convolve(&hydrogen, &unlimited()).unwrap();
        assert_eq!(
            summary(&h2),
            [
                (2, dec!(0.999770013225), dec!(2.0157)),
                (3, dec!(0.00022997355), dec!(3.0219)),
                (4, dec!(0.000000013225), dec!(4.0282)),
            ]
        );
        assert_eq!(h2.total_probability(), Decimal::ONE);
        // Convolving with certainty changes nothing
        assert_eq!(hydrogen.convolve(&Distribution::certain(), &unlimited()).unwrap(), hydrogen);
    }

    #[test]
    fn powers() {
        let budget = unlimited();
        let carbon = Distribution::of_element(&element("C"));
        let mut repeated = Distribution::certain();
        for _ in 0..5 {
            repeated = repeated.convolve(&carbon, &budget).unwrap();
        }
        let squared = carbon.power(5, &budget).unwrap();
        assert_eq!(squared.len(), 6);
        for ((a, x), (b, y)) in repeated.bins().zip(squared.bins()) {
            assert_eq!(a, b);
            assert_eq!(x.probability.round_dp(20), y.probability.round_dp(20));
        }
        assert_eq!(carbon.power(0, &budget).unwrap(), Distribution::certain());
    }

    #[test]
    fn pruning() {
        let config = SpectrumConfig::default().with_min_fraction(Some(dec!(1e-6)));
        let budget = Budget::start(&config);
        let hydrogen = Distribution::of_element(&element("H"));
        let h2 = hydrogen.convolve(&hydrogen, &budget).unwrap();
        // The 2H2 bin is too improbable to keep
        assert_eq!(h2.len(), 2);
        assert_eq!(h2.bins().last().unwrap().0, 3);

        // The most probable bin is never pruned, no matter how strict the threshold
        let config = SpectrumConfig::default().with_min_fraction(Some(Decimal::ONE));
        let h2 = hydrogen.convolve(&hydrogen, &Budget::start(&config)).unwrap();
        assert_eq!(h2.len(), 1);
        assert_eq!(h2.bins().next().unwrap().0, 2);
    }

    #[test]
    fn bin_limits() {
        let budget = ComputationBudget::default().with_max_bins(10);
        let budget = Budget::start(&SpectrumConfig::default().with_budget(budget));
        let carbon = Distribution::of_element(&element("C"));
        assert_eq!(carbon.power(8, &budget).unwrap().len(), 9);
        assert_eq!(
            carbon.power(100, &budget),
            Err(ComputationLimitError::Bins {
                bins: 17,
                max_bins: 10
            })
        );
    }

    #[test]
    fn time_limits() {
        let budget = ComputationBudget::default().with_max_duration(Some(Duration::ZERO));
        let budget = Budget::start(&SpectrumConfig::default().with_budget(budget));
        let carbon = Distribution::of_element(&element("C"));
        assert_eq!(
            carbon.power(2, &budget),
            Err(ComputationLimitError::Duration {
                limit: Duration::ZERO
            })
        );
    }
}
