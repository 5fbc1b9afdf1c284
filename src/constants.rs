pub mod socks4 {
    pub const SOCKS4_VERSION: u8 = 0x04;

    pub const CONNECT_CMD: u8 = 0x01;

    /// Placeholder address announcing a trailing hostname (SOCKS4a).
    pub const PASSTHROUGH_IP: [u8; 4] = [0, 0, 0, 1];

    pub const REPLY_LEN: usize = 8;

    #[repr(u8)]
    #[derive(FromPrimitive, Debug, Clone, Copy, PartialEq)]
    #[num_traits = "num"]
    pub enum Status {
        Granted = 0x5a,
        Rejected = 0x5b,
        IdentdRequired = 0x5c,
        IdentdFailed = 0x5d,
    }

    pub const DEFAULT_PORT: u16 = 1080;
}

pub mod socks5 {
    #[repr(u8)]
    #[derive(FromPrimitive, Debug, Clone, Copy)]
    #[num_traits = "num"]
    pub enum AYTP {
        IPv4 = 0x01,
        IPv6 = 0x04,
        DomainName = 0x03,
    }

    pub const SOCKS5_VERSION: u8 = 0x05;

    pub const NO_AUTHENTICATION_REQUIRED: u8 = 0x00;

    pub const CONNECT_CMD: u8 = 0x01;

    pub const RESERVED_CODE: u8 = 0x00;

    pub const SUCCEEDED_REPLY: u8 = 0x00;

    pub const DEFAULT_PORT: u16 = 1080;
}

pub mod http {
    pub const MAX_RESPONSE_HEAD: usize = 8192;

    pub const DEFAULT_PORT: u16 = 80;
    pub const DEFAULT_TLS_PORT: u16 = 443;
}
