//! # Mission drivers
//!
//! ## Overview
//!
//! A [`Driver`] turns one kind of PDS product into cubes. Every driver follows the same steps,
//! most of them provided by [`DriverContext`]:
//!
//! 1. read the label, repairing its text first when the mission needs it,
//! 2. check the identity keywords,
//! 3. derive the geometry of the allowed pixel objects, with the mission overrides,
//! 4. stream the pixels into the output cubes,
//! 5. import the embedded tables,
//! 6. translate the label into the `Instrument`, `BandBin`, `Archive`, `Mapping` and `Kernels`
//!    groups,
//! 7. post-process the cubes.
//!
//! The [`DriverRegistry`] picks the driver from the identity keywords of the label text
//! (see [`identity`]), or uses the one forced by name in the configuration. Products that name a
//! known mission and instrument at an unsupported processing level are rejected before anything is
//! read; everything else falls back to the generic `pds` driver.
//!
//! ## Drivers
//!
//! | Name | Products |
//! |---|---|
//! | `pds` | any PDS image or qube, or ISIS2 cube |
//! | `apollo` | Apollo 15/16/17 metric camera |
//! | `ctx` | MRO CTX EDR |
//! | `hirise_rdr` | MRO HiRISE RDR |
//! | `galileo_ssi` | Galileo SSI |
//! | `marci` | MRO MARCI |
//! | `virtis` | Rosetta VIRTIS level 2 and 3 |
//! | `voyager` | Voyager 1/2 ISS |
//! | `near_msi` | NEAR MSI |
//! | `kaguya_mi` | SELENE MI map products |
//! | `vims` | Cassini VIMS qubes |

pub mod apollo;
pub mod context;
pub mod ctx;
pub mod galileo_ssi;
pub mod generic;
pub mod hirise_rdr;
pub mod identity;
pub mod kaguya_mi;
pub mod marci;
pub mod near_msi;
pub mod outputs;
pub mod post_process;
pub mod projection;
pub mod vims;
pub mod virtis;
pub mod voyager;

use std::fs::File;

use camino::Utf8Path;
use log::{debug, info};

use crate::geometry::pds_geometry::ImageObject;
use crate::ingest_errors::IngestError;
use crate::label::fixups::label_text;
use crate::label::{read_label_bytes, Label};

pub use context::DriverContext;
pub use identity::{IdentityKey, KeyMatch, ProductIdentity};
pub use outputs::{FileOutputs, MemoryOutputs, OutputRole, OutputSet};

/// Static description of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub name: &'static str,
    /// Identity tuples the driver accepts; empty for the generic driver.
    pub keys: &'static [IdentityKey],
    /// Pixel objects the driver reads, in order of preference.
    pub allowed: &'static [ImageObject],
    pub description: &'static str,
}

/// One mission pipeline.
pub trait Driver: Sync {
    fn config(&self) -> &'static DriverConfig;

    fn name(&self) -> &'static str {
        self.config().name
    }

    /// Read the product label; drivers that repair labels override this.
    fn read_label(&self, ctx: &mut DriverContext) -> Result<Label, IngestError> {
        ctx.read_label()
    }

    /// Import the product described by `label` into `outputs`.
    fn ingest(
        &self,
        ctx: &mut DriverContext,
        label: &Label,
        outputs: &mut dyn OutputSet,
    ) -> Result<(), IngestError>;
}

/// Every driver, in order of precedence.
static DRIVERS: [&dyn Driver; 11] = [
    &apollo::ApolloDriver,
    &ctx::CtxDriver,
    &hirise_rdr::HiriseRdrDriver,
    &galileo_ssi::GalileoSsiDriver,
    &marci::MarciDriver,
    &virtis::VirtisDriver,
    &voyager::VoyagerDriver,
    &near_msi::NearMsiDriver,
    &kaguya_mi::KaguyaMiDriver,
    &vims::VimsDriver,
    &generic::PdsDriver,
];

/// Lookup of drivers by name and by product identity.
#[derive(Clone, Copy)]
pub struct DriverRegistry {
    drivers: &'static [&'static dyn Driver],
}

impl Default for DriverRegistry {
    fn default() -> Self {
        DriverRegistry { drivers: &DRIVERS }
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.drivers.iter().map(|d| d.name())
    }

    pub fn get(&self, name: &str) -> Option<&'static dyn Driver> {
        self.drivers
            .iter()
            .copied()
            .find(|d| d.name().eq_ignore_ascii_case(name))
    }

    fn generic(&self) -> &'static dyn Driver {
        self.get(generic::NAME).unwrap_or(&generic::PdsDriver)
    }

    /// Driver for a product with identity `identity`.
    ///
    /// Return
    /// ----------
    /// * The first driver with a full match, `WrongProduct` when a driver knows the mission and
    ///   instrument but not the processing level, otherwise the generic driver.
    pub fn select(&self, identity: &ProductIdentity) -> Result<&'static dyn Driver, IngestError> {
        let mut partial: Option<&'static dyn Driver> = None;
        for driver in self.drivers.iter().copied() {
            let best = driver
                .config()
                .keys
                .iter()
                .map(|key| identity.matches(key))
                .max()
                .unwrap_or(KeyMatch::None);
            match best {
                KeyMatch::Full => return Ok(driver),
                KeyMatch::MissionInstrument if partial.is_none() => partial = Some(driver),
                _ => {}
            }
        }
        match partial {
            Some(driver) => Err(IngestError::wrong_product(
                driver.config().description,
                identity.describe(),
            )),
            None => Ok(self.generic()),
        }
    }

    /// Driver for the product whose label is at `path`, or the one named `forced`.
    pub fn resolve(
        &self,
        path: &Utf8Path,
        forced: Option<&str>,
    ) -> Result<&'static dyn Driver, IngestError> {
        if let Some(name) = forced {
            let driver = self.get(name).ok_or_else(|| {
                IngestError::wrong_product(
                    format!("one of the drivers {}", self.names().collect::<Vec<_>>().join(", ")),
                    name,
                )
            })?;
            info!("Using driver {} as requested", driver.name());
            return Ok(driver);
        }

        let text = label_text(&read_label_bytes(File::open(path)?)?);
        let identity = ProductIdentity::sniff(&text);
        debug!("Identity of [{path}]: {}", identity.describe());
        let driver = self.select(&identity)?;
        info!("Using driver {} for [{path}]", driver.name());
        Ok(driver)
    }
}

#[cfg(test)]
mod test_registry {
    use super::*;

    #[test]
    fn test_names_are_unique() {
        let registry = DriverRegistry::new();
        let mut names: Vec<_> = registry.names().collect();
        let count = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), count);
        assert!(registry.get("CTX").is_some());
        assert!(registry.get("pds").is_some());
    }

    #[test]
    fn test_select_by_identity() {
        let registry = DriverRegistry::new();
        let ctx = ProductIdentity::sniff(
            "SPACECRAFT_NAME = MARS_RECONNAISSANCE_ORBITER\nINSTRUMENT_ID = CTX\n\
             DATA_SET_ID = \"MRO-M-CTX-2-EDR-L0-V1.0\"\nEND\n",
        );
        assert_eq!(registry.select(&ctx).unwrap().name(), "ctx");

        let unknown = ProductIdentity::sniff("SPACECRAFT_NAME = MAGELLAN\nINSTRUMENT_ID = RDRS\nEND\n");
        assert_eq!(registry.select(&unknown).unwrap().name(), "pds");
    }

    #[test]
    fn test_known_instrument_at_unknown_level_is_rejected() {
        let registry = DriverRegistry::new();
        let rdr = ProductIdentity::sniff(
            "SPACECRAFT_NAME = MARS_RECONNAISSANCE_ORBITER\nINSTRUMENT_ID = CTX\n\
             PRODUCT_TYPE = RDR\nEND\n",
        );
        let error = registry.select(&rdr).err().unwrap();
        assert_eq!(error.kind(), "WrongProduct");
        assert!(error.to_string().contains("CTX"));
    }

    #[test]
    fn test_forced_driver() {
        let registry = DriverRegistry::new();
        let path = Utf8Path::new("/nonexistent/product.img");
        assert_eq!(registry.resolve(path, Some("Marci")).unwrap().name(), "marci");
        assert_eq!(
            registry.resolve(path, Some("cassini")).err().unwrap().kind(),
            "WrongProduct"
        );
    }
}
