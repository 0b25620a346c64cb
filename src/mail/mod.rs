pub mod access;
pub mod decoders;
pub mod imap_client;
