// src/constants.rs

pub const USERNAME_REGEX: &str = r"^[A-Za-z0-9_.-]{1,32}$";

pub const LINE_DELIMITER: u8 = b'\n';
pub const FIELD_DELIMITER: char = '@';

pub const TAG_OK: &str = "OK";
pub const TAG_ERR: &str = "ERR";
pub const TAG_AUTH: &str = "AUTH";
pub const TAG_KEY: &str = "KEY";

pub const AUTH_USERNAME: &str = "USERNAME";
pub const AUTH_PASSWORD: &str = "PASSWORD";
pub const AUTH_OK: &str = "OK";
pub const AUTH_FAIL: &str = "FAIL";

pub const READY: &str = "READY";

pub const ROLE_SERVER: &str = "server";

pub const DEFAULT_LISTEN_PORT: u16 = 4450;
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
pub const DEFAULT_MAX_LINE_LENGTH: usize = 8 * 1024;
pub const READ_BUFFER_SIZE: usize = 8 * 1024;
pub const SESSION_KEY_LEN: usize = 32;

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

pub const PART_SUFFIX: &str = ".part";
