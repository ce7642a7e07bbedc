// src/services/address_history.rs

use chrono::{DateTime, Utc};

use crate::{
    common::error::AppError,
    models::account::{ArchivedAddress, BillingAddress},
};

/// Se o endereço mudou, arquiva o que estava salvo no topo do histórico.
///
/// Retorna o histórico novo, ou `None` quando o endereço é igual e nada deve ser gravado.
pub fn archive_on_save(
    persisted: &BillingAddress,
    draft: &BillingAddress,
    history: &[ArchivedAddress],
    now: DateTime<Utc>,
) -> Option<Vec<ArchivedAddress>> {
    if persisted == draft {
        return None;
    }

    let mut updated = Vec::with_capacity(history.len() + 1);
    updated.push(ArchivedAddress {
        address: persisted.clone(),
        archived_at: now,
    });
    updated.extend_from_slice(history);
    Some(updated)
}

// Resultado de uma restauração: o novo endereço ativo e o histórico atualizado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredAddress {
    pub billing_address: BillingAddress,
    pub address_history: Vec<ArchivedAddress>,
}

// Troca-e-registra: a entrada `index` vira o endereço ativo, sai do histórico
// (por igualdade estrutural) e o endereço substituído entra no topo com carimbo novo.
pub fn restore_from_history(
    current: &BillingAddress,
    history: &[ArchivedAddress],
    index: usize,
    now: DateTime<Utc>,
) -> Result<RestoredAddress, AppError> {
    let chosen = history
        .get(index)
        .ok_or(AppError::HistoryEntryNotFound(index))?
        .clone();

    let mut address_history: Vec<ArchivedAddress> = Vec::with_capacity(history.len());
    address_history.push(ArchivedAddress {
        address: current.clone(),
        archived_at: now,
    });

    let mut removed = false;
    for entry in history {
        if !removed && *entry == chosen {
            removed = true;
            continue;
        }
        address_history.push(entry.clone());
    }

    Ok(RestoredAddress {
        billing_address: chosen.address,
        address_history,
    })
}
