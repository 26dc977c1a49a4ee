use crate::consistent_hash::jump_consistent_hash;
use crate::errors::{LabelerError, Result};
use crate::model::config::VirtualPersonPool;

#[derive(Debug, Clone, Copy)]
struct IdPool {
    virtual_people_id_offset: i64,
    population_index_offset: i64,
}

/// Maps a seed to a virtual person id drawn uniformly from a set of pools.
///
/// Pools are laid end to end in input order to form a population index
/// space; a jump-hashed index is translated back to an id of the pool that
/// contains it.
#[derive(Debug, Clone)]
pub struct VirtualPeopleSelector {
    total_population: i32,
    pools: Vec<IdPool>,
}

impl VirtualPeopleSelector {
    pub fn build(pools: &[VirtualPersonPool]) -> Result<Self> {
        let mut total: i64 = 0;
        let mut compiled = Vec::with_capacity(pools.len());
        for pool in pools.iter().filter(|p| p.total_population > 0) {
            let offset = i64::try_from(pool.population_offset).map_err(|_| {
                LabelerError::model(format!(
                    "population_offset {} is out of range",
                    pool.population_offset
                ))
            })?;
            i64::try_from(pool.total_population - 1)
                .ok()
                .and_then(|last| offset.checked_add(last))
                .ok_or_else(|| {
                    LabelerError::model(format!(
                        "The last virtual person id of pool ({}, {}) overflows",
                        pool.population_offset, pool.total_population
                    ))
                })?;
            compiled.push(IdPool {
                virtual_people_id_offset: offset,
                population_index_offset: total,
            });
            total = i64::try_from(pool.total_population)
                .ok()
                .and_then(|n| total.checked_add(n))
                .ok_or_else(|| LabelerError::model("The total population overflows"))?;
        }
        if total == 0 {
            return Err(LabelerError::model(
                "The total population of the pools is 0. The model is invalid.",
            ));
        }
        let total_population = i32::try_from(total).map_err(|_| {
            LabelerError::model(format!(
                "The total population of the pools is {total}, larger than {}",
                i32::MAX
            ))
        })?;
        Ok(Self {
            total_population,
            pools: compiled,
        })
    }

    pub fn total_population(&self) -> i32 {
        self.total_population
    }

    pub fn virtual_person_id(&self, seed: u64) -> i64 {
        let index = i64::from(jump_consistent_hash(seed, self.total_population));
        // pools[0] starts at index 0, so the partition point is at least 1
        let pos = self
            .pools
            .partition_point(|p| p.population_index_offset <= index)
            .max(1);
        let pool = self.pools[pos - 1];
        index - pool.population_index_offset + pool.virtual_people_id_offset
    }
}
