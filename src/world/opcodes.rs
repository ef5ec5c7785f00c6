//! 3.3.5a world opcodes the session uses or refers to.
//!
//! Client opcodes are sent as `u32`, server opcodes as `u16`, but every value fits in 16 bits.

pub const CMSG_CHAR_ENUM: u16 = 0x037;
pub const SMSG_CHAR_ENUM: u16 = 0x03B;
pub const CMSG_PLAYER_LOGIN: u16 = 0x03D;
pub const SMSG_UPDATE_OBJECT: u16 = 0x0A9;
pub const CMSG_PING: u16 = 0x1DC;
pub const SMSG_PONG: u16 = 0x1DD;
pub const SMSG_AUTH_CHALLENGE: u16 = 0x1EC;
pub const CMSG_AUTH_SESSION: u16 = 0x1ED;
pub const SMSG_AUTH_RESPONSE: u16 = 0x1EE;
pub const SMSG_COMPRESSED_UPDATE_OBJECT: u16 = 0x1F6;
pub const SMSG_LOGIN_VERIFY_WORLD: u16 = 0x236;
pub const SMSG_WARDEN_DATA: u16 = 0x2E6;
pub const CMSG_WARDEN_DATA: u16 = 0x2E7;

/// Name for log output, [`None`] for opcodes not listed here.
pub const fn name(opcode: u16) -> Option<&'static str> {
    Some(match opcode {
        CMSG_CHAR_ENUM => "CMSG_CHAR_ENUM",
        SMSG_CHAR_ENUM => "SMSG_CHAR_ENUM",
        CMSG_PLAYER_LOGIN => "CMSG_PLAYER_LOGIN",
        SMSG_UPDATE_OBJECT => "SMSG_UPDATE_OBJECT",
        CMSG_PING => "CMSG_PING",
        SMSG_PONG => "SMSG_PONG",
        SMSG_AUTH_CHALLENGE => "SMSG_AUTH_CHALLENGE",
        CMSG_AUTH_SESSION => "CMSG_AUTH_SESSION",
        SMSG_AUTH_RESPONSE => "SMSG_AUTH_RESPONSE",
        SMSG_COMPRESSED_UPDATE_OBJECT => "SMSG_COMPRESSED_UPDATE_OBJECT",
        SMSG_LOGIN_VERIFY_WORLD => "SMSG_LOGIN_VERIFY_WORLD",
        SMSG_WARDEN_DATA => "SMSG_WARDEN_DATA",
        CMSG_WARDEN_DATA => "CMSG_WARDEN_DATA",
        _ => return None,
    })
}
