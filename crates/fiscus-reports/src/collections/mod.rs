//! Monthly and by-sector collections report families.

pub(crate) mod city;
mod city_nontax;
mod city_other_govts;
mod city_tax;
mod sales_sector;
mod wage_sector;

pub use city_nontax::CityNonTaxCollections;
pub use city_other_govts::CityOtherGovtsCollections;
pub use city_tax::CityTaxCollections;
pub use sales_sector::SalesCollectionsBySector;
pub use wage_sector::WageCollectionsBySector;
