//! # fiscus-reports
//!
//! One thin specialization per report family, in three groups: monthly and
//! by-sector collections, the quarterly QCMR reports, and the annual
//! budget-in-brief. Each family declares its descriptor (parameters, raw
//! path convention, crop strategy) and plugs its crop, row labeling,
//! reshape, and subtotal algebra into the runtime's pipeline.

pub mod budget;
pub mod collections;
mod dept_merge;
pub mod labels;
pub mod qcmr;

pub use budget::BudgetSummary;
pub use collections::{
    CityNonTaxCollections, CityOtherGovtsCollections, CityTaxCollections,
    SalesCollectionsBySector, WageCollectionsBySector,
};
pub use qcmr::{
    CashReportFundBalances, CashReportNetCashFlow, CashReportRevenue, CashReportSpending,
    DepartmentObligations, FullTimePositions, PersonalServices,
};

use fiscus_core::error::FiscusResult;
use fiscus_runtime::Registry;

/// Register every built-in report family. Called once at startup; the
/// registry is read-only afterwards.
pub fn register_builtin(registry: &mut Registry) -> FiscusResult<()> {
    registry.register(CityTaxCollections::entry())?;
    registry.register(CityNonTaxCollections::entry())?;
    registry.register(CityOtherGovtsCollections::entry())?;
    registry.register(WageCollectionsBySector::entry())?;
    registry.register(SalesCollectionsBySector::entry())?;
    registry.register(CashReportRevenue::entry())?;
    registry.register(CashReportSpending::entry())?;
    registry.register(CashReportNetCashFlow::entry())?;
    registry.register(CashReportFundBalances::entry())?;
    registry.register(DepartmentObligations::entry())?;
    registry.register(FullTimePositions::entry())?;
    registry.register(PersonalServices::entry())?;
    registry.register(BudgetSummary::entry())?;
    Ok(())
}
