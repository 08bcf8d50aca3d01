//! NAS protocol enumerations (TS 24.501 §9)

use crate::codec::CodecError;

/// Extended protocol discriminator for 5GMM messages.
pub const EPD_5GMM: u8 = 0x7E;

/// Extended protocol discriminator for 5GSM messages.
pub const EPD_5GSM: u8 = 0x2E;

/// 5GMM message types (TS 24.501 Table 9.7.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    RegistrationRequest = 0x41,
    RegistrationAccept = 0x42,
    RegistrationComplete = 0x43,
    RegistrationReject = 0x44,
    DeregistrationRequestUeOriginating = 0x45,
    DeregistrationAcceptUeOriginating = 0x46,
    ConfigurationUpdateCommand = 0x54,
    ConfigurationUpdateComplete = 0x55,
    AuthenticationRequest = 0x56,
    AuthenticationResponse = 0x57,
    AuthenticationReject = 0x58,
    AuthenticationFailure = 0x59,
    SecurityModeCommand = 0x5D,
    SecurityModeComplete = 0x5E,
    SecurityModeReject = 0x5F,
    UlNasTransport = 0x67,
    DlNasTransport = 0x68,
}

impl TryFrom<u8> for MessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageType::*;
        Ok(match value {
            0x41 => RegistrationRequest,
            0x42 => RegistrationAccept,
            0x43 => RegistrationComplete,
            0x44 => RegistrationReject,
            0x45 => DeregistrationRequestUeOriginating,
            0x46 => DeregistrationAcceptUeOriginating,
            0x54 => ConfigurationUpdateCommand,
            0x55 => ConfigurationUpdateComplete,
            0x56 => AuthenticationRequest,
            0x57 => AuthenticationResponse,
            0x58 => AuthenticationReject,
            0x59 => AuthenticationFailure,
            0x5D => SecurityModeCommand,
            0x5E => SecurityModeComplete,
            0x5F => SecurityModeReject,
            0x67 => UlNasTransport,
            0x68 => DlNasTransport,
            other => return Err(CodecError::UnknownMessageType(other)),
        })
    }
}

/// 5GSM message types (TS 24.501 Table 9.7.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SmMessageType {
    PduSessionEstablishmentRequest = 0xC1,
    PduSessionEstablishmentAccept = 0xC2,
    PduSessionEstablishmentReject = 0xC3,
    PduSessionReleaseRequest = 0xD1,
    PduSessionReleaseReject = 0xD2,
    PduSessionReleaseCommand = 0xD3,
    PduSessionReleaseComplete = 0xD4,
}

impl TryFrom<u8> for SmMessageType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use SmMessageType::*;
        Ok(match value {
            0xC1 => PduSessionEstablishmentRequest,
            0xC2 => PduSessionEstablishmentAccept,
            0xC3 => PduSessionEstablishmentReject,
            0xD1 => PduSessionReleaseRequest,
            0xD2 => PduSessionReleaseReject,
            0xD3 => PduSessionReleaseCommand,
            0xD4 => PduSessionReleaseComplete,
            other => return Err(CodecError::UnknownMessageType(other)),
        })
    }
}

/// Security header type (TS 24.501 §9.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SecurityHeaderType {
    /// Plain NAS message, no security protection
    #[default]
    Plain = 0x00,
    /// Integrity protected
    IntegrityProtected = 0x01,
    /// Integrity protected and ciphered
    IntegrityProtectedAndCiphered = 0x02,
    /// Integrity protected with new 5G NAS security context
    IntegrityProtectedNewContext = 0x03,
    /// Integrity protected and ciphered with new 5G NAS security context
    IntegrityProtectedAndCipheredNewContext = 0x04,
}

impl SecurityHeaderType {
    /// True when the message carries a MAC and sequence number.
    pub fn is_protected(self) -> bool {
        self != SecurityHeaderType::Plain
    }

    /// True when the payload is ciphered.
    pub fn is_ciphered(self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedAndCiphered
                | SecurityHeaderType::IntegrityProtectedAndCipheredNewContext
        )
    }

    /// True when the message establishes a new security context.
    pub fn is_new_context(self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedNewContext
                | SecurityHeaderType::IntegrityProtectedAndCipheredNewContext
        )
    }
}

impl TryFrom<u8> for SecurityHeaderType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use SecurityHeaderType::*;
        Ok(match value & 0x0F {
            0x00 => Plain,
            0x01 => IntegrityProtected,
            0x02 => IntegrityProtectedAndCiphered,
            0x03 => IntegrityProtectedNewContext,
            0x04 => IntegrityProtectedAndCipheredNewContext,
            other => return Err(CodecError::Invalid(format!("security header type {other:#x}"))),
        })
    }
}

/// 5GMM cause values (TS 24.501 Table 9.11.3.2.1), the subset the
/// authentication procedures produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Cause5Gmm {
    /// MAC failure (cause #20)
    MacFailure = 20,
    /// Synch failure (cause #21)
    SynchFailure = 21,
    /// Protocol error, unspecified (cause #111)
    ProtocolErrorUnspecified = 111,
}

impl TryFrom<u8> for Cause5Gmm {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            20 => Cause5Gmm::MacFailure,
            21 => Cause5Gmm::SynchFailure,
            111 => Cause5Gmm::ProtocolErrorUnspecified,
            other => return Err(CodecError::Invalid(format!("5GMM cause {other}"))),
        })
    }
}
