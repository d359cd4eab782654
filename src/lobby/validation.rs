use crate::domain::GameTable;
use crate::engine::hilo::{ConfigPatch, TableConfig};
use crate::game::GameError;

pub fn validate_config(cfg: &TableConfig) -> Result<(), GameError> {
    if cfg.small_blind == 0 || cfg.big_blind == 0 {
        return Err(GameError::bad_request("blinds must be greater than zero"));
    }
    if cfg.small_blind >= cfg.big_blind {
        return Err(GameError::bad_request(
            "small blind must be lower than the big blind",
        ));
    }
    Ok(())
}

/// Merges `patch` over `base` and validates the result.
pub fn validate_config_patch(
    base: TableConfig,
    patch: &ConfigPatch,
) -> Result<TableConfig, GameError> {
    if *patch == ConfigPatch::default() {
        return Err(GameError::bad_request("config update has no fields"));
    }
    let merged = patch.merged_into(base);
    validate_config(&merged)?;
    Ok(merged)
}

pub fn ensure_owner(table: &GameTable, user_id: &str) -> Result<(), GameError> {
    if table.owner_id != user_id {
        return Err(GameError::unauthorized(
            "only the table owner may perform this action",
        ));
    }
    Ok(())
}
