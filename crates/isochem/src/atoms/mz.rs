use std::ops::Div;

use rust_decimal::Decimal;

use crate::{AverageMass, AverageMz, Charge, MonoisotopicMass, MonoisotopicMz};

macro_rules! mz_div_impls {
    // NOTE: `$mz_type` is a `tt` since it actually has to play the role of both a type (`ty`) and expression (`expr`)
    // in this impl, and `tt` appears to be the only way to pull off that sort of "metavariable polymorphism"
    ($($mass_type:ident => $mz_type:tt),+ $(,)?) => {
        $(
            // NOTE: Divides by the magnitude of the charge, so that anions still have positive m/z values
            impl Div<Charge> for $mass_type {
                type Output = $mz_type;

                fn div(self, rhs: Charge) -> Self::Output {
                    $mz_type(self.0 / Decimal::from(rhs.0.unsigned_abs()))
                }
            }

            impl $mass_type {
                /// The m/z of this (neutral) mass once `charge` electrons have been removed (or added, for negative
                /// charges). Uncharged masses are returned unchanged.
                #[must_use]
                pub fn to_mz(self, charge: Charge, electron_mass: Decimal) -> $mz_type {
                    if charge.is_zero() {
                        return $mz_type(self.0);
                    }
                    let ion = Self(self.0 - Decimal::from(charge.0) * electron_mass);
                    ion / charge
                }
            }
        )+
    };
}

mz_div_impls!(MonoisotopicMass => MonoisotopicMz, AverageMass => AverageMz);
