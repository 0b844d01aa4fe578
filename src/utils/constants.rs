/// Raydium AMM program id, the log source every subscription mentions.
pub const RAYDIUM_AMM_PROGRAM_ID: &str = "675kPX9MHTjS2zt1qfr1NYHuzeLXfQM9H24wFSUt1Mp8";

pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";

/// Literal prefix carried by swap telemetry lines inside transaction logs.
pub const RAY_LOG_PREFIX: &str = "ray_log: ";

/// Version tag observed on newer ray_log payloads.
pub const RAY_LOG_VERSION_3: u8 = 0x03;

pub const SOL_DECIMALS: u32 = 9;
pub const USDC_DECIMALS: u32 = 6;
pub const USDT_DECIMALS: u32 = 6;

/// Vault account holding the SOL side of the SOL/USDC pool.
pub const SOL_USDC_TOKEN_A_ACCOUNT: &str = "9wFFyRfZBsuAha4YcuxcXLKwMxJR43S7fPfQLusDBzvT";

#[non_exhaustive]
pub struct TokenMint;

impl TokenMint {
    pub const SOL: &'static str = "So11111111111111111111111111111111111111112";
    pub const USDC: &'static str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
    pub const USDT: &'static str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
}
