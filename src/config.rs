use std::{fs, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::{addr::Address, cache::CacheLevel, hierarchy::CacheHierarchy};

const ADDRESS_BITS: u32 = Address::BITS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required parameter `{0}`")]
    Missing(&'static str),
    #[error("could not read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid write-allocate flag `{0}` (expected 0, 1, true or false)")]
    WriteAllocate(String),
    #[error("{level}: 2^{size_bits} bytes cannot hold 2^{assoc_bits} ways of 2^{block_bits}-byte blocks")]
    TooSmall {
        level: &'static str,
        size_bits: u32,
        assoc_bits: u32,
        block_bits: u32,
    },
    #[error("{level}: 2^{size_bits} bytes does not fit a 32-bit address space")]
    TooLarge { level: &'static str, size_bits: u32 },
}

/// Per-level parameters as they appear in the JSON config. All sizes are log2.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelConfig {
    pub size: Option<u32>,
    pub assoc: Option<u32>,
    pub cyc: Option<u32>,
}

/// Raw, possibly incomplete configuration. Several sources can be layered
/// with [`Config::overlay`] before [`Config::build`] checks the result.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub mem_cyc: Option<u32>,
    pub bsize: Option<u32>,
    pub wr_alloc: Option<bool>,
    #[serde(default)]
    pub l1: LevelConfig,
    #[serde(default)]
    pub l2: LevelConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelGeometry {
    pub size_bits: u32,
    pub assoc_bits: u32,
    pub cycles: u32,
}

/// Validated configuration, safe to hand to [`CacheHierarchy::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HierarchyConfig {
    pub block_bits: u32,
    pub mem_cycles: u32,
    pub write_allocate: bool,
    pub l1: LevelGeometry,
    pub l2: LevelGeometry,
}

pub fn parse_flag(value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(ConfigError::WriteAllocate(value.to_owned())),
    }
}

impl LevelConfig {
    fn overlay(self, top: LevelConfig) -> LevelConfig {
        LevelConfig {
            size: top.size.or(self.size),
            assoc: top.assoc.or(self.assoc),
            cyc: top.cyc.or(self.cyc),
        }
    }

    fn build(
        &self,
        level: &'static str,
        names: [&'static str; 3],
        block_bits: u32,
    ) -> Result<LevelGeometry, ConfigError> {
        let [size_name, assoc_name, cyc_name] = names;
        let size_bits = self.size.ok_or(ConfigError::Missing(size_name))?;
        let assoc_bits = self.assoc.ok_or(ConfigError::Missing(assoc_name))?;
        let cycles = self.cyc.ok_or(ConfigError::Missing(cyc_name))?;

        if size_bits >= ADDRESS_BITS {
            return Err(ConfigError::TooLarge { level, size_bits });
        }
        if size_bits < block_bits.saturating_add(assoc_bits) {
            return Err(ConfigError::TooSmall {
                level,
                size_bits,
                assoc_bits,
                block_bits,
            });
        }
        Ok(LevelGeometry {
            size_bits,
            assoc_bits,
            cycles,
        })
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Config, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: PathBuf) -> Result<Config, ConfigError> {
        let json = fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
        Config::from_json(&json)
    }

    /// Reads the classic `--mem-cyc`, `--bsize`, `--l1-size` ... flags.
    pub fn from_args(args: &mut pico_args::Arguments) -> Result<Config, pico_args::Error> {
        Ok(Config {
            mem_cyc: args.opt_value_from_str("--mem-cyc")?,
            bsize: args.opt_value_from_str("--bsize")?,
            wr_alloc: args.opt_value_from_fn("--wr-alloc", parse_flag)?,
            l1: LevelConfig {
                size: args.opt_value_from_str("--l1-size")?,
                assoc: args.opt_value_from_str("--l1-assoc")?,
                cyc: args.opt_value_from_str("--l1-cyc")?,
            },
            l2: LevelConfig {
                size: args.opt_value_from_str("--l2-size")?,
                assoc: args.opt_value_from_str("--l2-assoc")?,
                cyc: args.opt_value_from_str("--l2-cyc")?,
            },
        })
    }

    /// Fields set in `top` win over fields set in `self`.
    pub fn overlay(self, top: Config) -> Config {
        Config {
            mem_cyc: top.mem_cyc.or(self.mem_cyc),
            bsize: top.bsize.or(self.bsize),
            wr_alloc: top.wr_alloc.or(self.wr_alloc),
            l1: self.l1.overlay(top.l1),
            l2: self.l2.overlay(top.l2),
        }
    }

    pub fn build(&self) -> Result<HierarchyConfig, ConfigError> {
        let mem_cycles = self.mem_cyc.ok_or(ConfigError::Missing("mem-cyc"))?;
        let block_bits = self.bsize.ok_or(ConfigError::Missing("bsize"))?;
        let write_allocate = self.wr_alloc.ok_or(ConfigError::Missing("wr-alloc"))?;
        if block_bits >= ADDRESS_BITS {
            return Err(ConfigError::TooLarge {
                level: "block",
                size_bits: block_bits,
            });
        }
        let l1 = self
            .l1
            .build("L1", ["l1-size", "l1-assoc", "l1-cyc"], block_bits)?;
        let l2 = self
            .l2
            .build("L2", ["l2-size", "l2-assoc", "l2-cyc"], block_bits)?;

        Ok(HierarchyConfig {
            block_bits,
            mem_cycles,
            write_allocate,
            l1,
            l2,
        })
    }
}

impl HierarchyConfig {
    pub fn to_hierarchy(&self) -> CacheHierarchy {
        CacheHierarchy::new(
            CacheLevel::new("L1", self.block_bits, &self.l1),
            CacheLevel::new("L2", self.block_bits, &self.l2),
            self.mem_cycles,
            self.write_allocate,
        )
    }
}
