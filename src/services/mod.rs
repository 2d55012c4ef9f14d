pub mod cleanup;
pub mod ledger;
