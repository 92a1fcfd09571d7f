/// Parlor Crypto Library
///
/// The server never encrypts or decrypts message content. It only mints the
/// symmetric content key each conversation is created with and hands it to
/// participants in their contact list.
pub mod keys;
