//! # marshal-protocol
//!
//! Message models carried over the marshal codec.
//!
//! This crate provides:
//! - Message headers with signature dispatch
//! - Command messages addressed to a fleet manager region
//! - Package file headers and package directory scanning

pub mod error;
pub mod message;
pub mod package;

pub use error::ProtocolError;
pub use message::{
    decode_message, encode_command, encode_package, read_message, write_command, write_package,
    CommandStructure, Message, MessageHeader, MessageKind, COMMAND_SIGNATURE, MESSAGE_VERSION,
    PACKAGE_SIGNATURE,
};
pub use package::{
    find_package, import_package, package_file_name, package_file_name_with_extension,
    read_package_file, read_package_header, scan_packages, validate_package_name,
    write_package_header, write_package_header_file, Package, PackageHeader,
    DEFAULT_PACKAGE_EXTENSION, PACKAGE_FILE_SIGNATURE,
};
