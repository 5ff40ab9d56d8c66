use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokensend::storage::SledFieldStore;
use tokensend::wallet::fake::FakeWallet;
use tokensend::{Config, TransferSession};

pub const RECIPIENT: &str = "0x000000000000000000000000000000000000dEaD";
pub const CONTRACT: &str = "0x1111111111111111111111111111111111111111";

#[allow(dead_code)]
pub fn open_store(dir: &TempDir) -> Arc<SledFieldStore> {
    Arc::new(SledFieldStore::open(dir.path().join("fields")).expect("failed to open field store"))
}

#[allow(dead_code)]
pub fn open_session(wallet: &Arc<FakeWallet>, store: Arc<SledFieldStore>) -> TransferSession {
    TransferSession::open(Some(wallet.clone()), store, &Config::default())
        .expect("failed to open session")
}

#[allow(dead_code)]
pub fn fill_form(session: &TransferSession, amount: &str) {
    session
        .set_recipient_address(RECIPIENT)
        .expect("failed to set recipient");
    session
        .set_token_amount(amount)
        .expect("failed to set amount");
    session
        .set_contract_address(CONTRACT)
        .expect("failed to set contract");
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
