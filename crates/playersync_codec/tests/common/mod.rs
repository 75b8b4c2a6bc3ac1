//! Shared fixtures for the codec integration tests.

#![allow(dead_code)]

use playersync_codec::{BinaryBuffer, BinaryCodec, BinarySerializer, Result, WireTag};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl WireTag for GameMode {
    const TYPE_NAME: &'static str = "GameMode";

    fn wire_tag(&self) -> u32 {
        match self {
            GameMode::Survival => 0,
            GameMode::Creative => 1,
            GameMode::Adventure => 2,
            GameMode::Spectator => 3,
        }
    }

    fn from_wire_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(GameMode::Survival),
            1 => Some(GameMode::Creative),
            2 => Some(GameMode::Adventure),
            3 => Some(GameMode::Spectator),
            _ => None,
        }
    }
}

/// Profile record synced between servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub id: Uuid,
    pub name: String,
    pub nickname: Option<String>,
    pub level: i32,
    pub experience: i64,
    pub health: f32,
    pub mode: GameMode,
    pub inventory: Vec<String>,
    pub skin: Vec<u8>,
}

pub fn sample_profile() -> PlayerProfile {
    PlayerProfile {
        id: Uuid::from_u128(0x069a79f4_44e9_4726_a5be_fca90e38aaf5),
        name: "Notch".to_string(),
        nickname: Some("n".to_string()),
        level: 30,
        experience: 1_395,
        health: 20.0,
        mode: GameMode::Survival,
        inventory: vec!["diamond_pickaxe".to_string(), "torch".to_string()],
        skin: vec![0xCA, 0xFE],
    }
}

pub fn empty_profile() -> PlayerProfile {
    PlayerProfile {
        id: Uuid::nil(),
        name: String::new(),
        nickname: None,
        level: 0,
        experience: 0,
        health: 0.0,
        mode: GameMode::Spectator,
        inventory: Vec::new(),
        skin: Vec::new(),
    }
}

/// Field-by-field binary layout for [`PlayerProfile`].
#[derive(Debug)]
pub struct PlayerProfileCodec;

impl BinaryCodec<PlayerProfile> for PlayerProfileCodec {
    fn write(&self, value: &PlayerProfile, buffer: &mut BinaryBuffer) -> Result<()> {
        buffer.write_uuid(&value.id);
        buffer.write_string(&value.name)?;
        buffer.write_optional_string(value.nickname.as_deref())?;
        buffer.write_var_int(value.level);
        buffer.write_var_long(value.experience);
        buffer.write_float(value.health);
        buffer.write_enum(&value.mode);
        buffer.write_var_int(value.inventory.len() as i32);
        for item in &value.inventory {
            buffer.write_string(item)?;
        }
        buffer.write_bytes(&value.skin)?;
        Ok(())
    }

    fn read(&self, buffer: &mut BinaryBuffer) -> Result<PlayerProfile> {
        let id = buffer.read_uuid()?;
        let name = buffer.read_string()?;
        let nickname = buffer.read_optional_string()?;
        let level = buffer.read_var_int()?;
        let experience = buffer.read_var_long()?;
        let health = buffer.read_float()?;
        let mode = buffer.read_enum()?;
        let count = buffer.read_var_int()?;
        let mut inventory = Vec::with_capacity(count.clamp(0, 64) as usize);
        for _ in 0..count {
            inventory.push(buffer.read_string()?);
        }
        let skin = buffer.read_bytes()?;

        Ok(PlayerProfile {
            id,
            name,
            nickname,
            level,
            experience,
            health,
            mode,
            inventory,
            skin,
        })
    }
}

pub fn binary_serializer() -> BinarySerializer<PlayerProfile, PlayerProfileCodec> {
    BinarySerializer::new(PlayerProfileCodec)
}
