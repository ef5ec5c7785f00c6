//! Client side of a logon server connection.
//!
//! [`LogonSession`] is driven by the host calling [`LogonSession::update`] on a regular
//! cadence. Each call reads whatever the transport has, cuts as many complete messages as
//! possible out of the receive buffer and runs the callbacks for them in order.
//!
//! ```text
//! Connected -> ChallengeSent -> ChallengeReceived [-> PinRequired | AuthenticatorRequired]
//!     -> ProofSent -> Authenticated -> RealmListRequested -> RealmListReceived
//! ```
//!
//! Any step can end in `Failed`.

use crate::client::{Credentials, SrpClientChallenge, SrpClientUser};
use crate::config::{ClientInfo, SrpOptions};
use crate::error::{ErrorKind, SessionError};
use crate::integrity::login_integrity_check_generic;
use crate::key::SessionKey;
use crate::logon::opcodes::LogonOpcode;
use crate::logon::packets::{
    expected_length, AuthenticatorRequest, FrameLength, LogonChallengeRequest,
    LogonChallengeResponse, LogonProofRequest, LogonProofResponse, Realm, RealmListRequest,
    RealmListResponse, ServerChallenge,
};
use crate::normalized_string::NormalizedString;
use crate::pin;
use crate::transport::{read_available, ReadStatus, TcpTransport, Transport};
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[cfg(test)]
use crate::key::PRIVATE_KEY_LENGTH;

/// Time allowed from [`LogonSession::authenticate`] until the session is authenticated.
pub const AUTHENTICATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a [`LogonSession`] is in the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogonState {
    Disconnected,
    Connected,
    ChallengeSent,
    ChallengeReceived,
    /// Waiting for [`LogonSession::submit_security_code`] with a PIN.
    PinRequired,
    /// Waiting for [`LogonSession::submit_security_code`] with an authenticator token.
    AuthenticatorRequired,
    ProofSent,
    Authenticated,
    RealmListRequested,
    RealmListReceived,
    Failed,
}

impl LogonState {
    const fn is_authenticating(self) -> bool {
        matches!(
            self,
            Self::ChallengeSent
                | Self::ChallengeReceived
                | Self::PinRequired
                | Self::AuthenticatorRequired
                | Self::ProofSent
        )
    }

    const fn is_waiting_for_code(self) -> bool {
        matches!(self, Self::PinRequired | Self::AuthenticatorRequired)
    }
}

impl Display for LogonState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogonState::Disconnected => "Disconnected",
            LogonState::Connected => "Connected",
            LogonState::ChallengeSent => "ChallengeSent",
            LogonState::ChallengeReceived => "ChallengeReceived",
            LogonState::PinRequired => "PinRequired",
            LogonState::AuthenticatorRequired => "AuthenticatorRequired",
            LogonState::ProofSent => "ProofSent",
            LogonState::Authenticated => "Authenticated",
            LogonState::RealmListRequested => "RealmListRequested",
            LogonState::RealmListReceived => "RealmListReceived",
            LogonState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

struct PendingProof {
    challenge: SrpClientChallenge,
    server: ServerChallenge,
}

/// Logon server connection.
///
/// Owns its transport, receive buffer and session key. The session key is handed to the
/// world session with [`LogonSession::take_session_key`].
pub struct LogonSession<T: Transport = TcpTransport> {
    transport: T,
    client_info: ClientInfo,
    srp_options: SrpOptions,
    state: LogonState,
    buffer: Vec<u8>,
    user: Option<SrpClientUser>,
    pending: Option<PendingProof>,
    security_code: Option<String>,
    session_key: Option<SessionKey>,
    realms: Vec<Realm>,
    deadline: Option<Instant>,
    timed_out: bool,
    on_success: Option<Box<dyn FnMut()>>,
    on_failure: Option<Box<dyn FnMut(&SessionError)>>,
    on_realm_list: Option<Box<dyn FnMut(&[Realm])>>,
    #[cfg(test)]
    client_private_key: Option<[u8; PRIVATE_KEY_LENGTH as usize]>,
}

impl LogonSession<TcpTransport> {
    /// Connects to a logon server, usually on [`DEFAULT_LOGON_PORT`](crate::config::DEFAULT_LOGON_PORT).
    ///
    /// # Errors
    ///
    /// Returns a transport error if the host can not be resolved or refuses the connection.
    pub fn connect(host: &str, port: u16, client_info: ClientInfo) -> Result<Self, SessionError> {
        let transport = TcpTransport::connect(host, port).map_err(|e| {
            SessionError::transport(format!("could not connect to {}:{}: {}", host, port, e))
        })?;

        info!(host, port, "connected to logon server");

        Ok(Self::from_transport(transport, client_info))
    }
}

impl<T: Transport> LogonSession<T> {
    /// Session over an already connected transport.
    pub fn from_transport(transport: T, client_info: ClientInfo) -> Self {
        Self {
            transport,
            client_info,
            srp_options: SrpOptions::default(),
            state: LogonState::Connected,
            buffer: Vec::new(),
            user: None,
            pending: None,
            security_code: None,
            session_key: None,
            realms: Vec::new(),
            deadline: None,
            timed_out: false,
            on_success: None,
            on_failure: None,
            on_realm_list: None,
            #[cfg(test)]
            client_private_key: None,
        }
    }

    /// For servers that deviate from the game client's SRP6.
    pub fn with_srp_options(mut self, options: SrpOptions) -> Self {
        self.srp_options = options;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_client_private_key(
        mut self,
        key: [u8; PRIVATE_KEY_LENGTH as usize],
    ) -> Self {
        self.client_private_key = Some(key);
        self
    }

    /// Called once the server proof has been verified.
    pub fn on_success(&mut self, callback: impl FnMut() + 'static) {
        self.on_success = Some(Box::new(callback));
    }

    /// Called once when the session fails, with the same error that is returned.
    pub fn on_failure(&mut self, callback: impl FnMut(&SessionError) + 'static) {
        self.on_failure = Some(Box::new(callback));
    }

    pub fn on_realm_list(&mut self, callback: impl FnMut(&[Realm]) + 'static) {
        self.on_realm_list = Some(Box::new(callback));
    }

    pub const fn state(&self) -> LogonState {
        self.state
    }

    pub const fn client_info(&self) -> &ClientInfo {
        &self.client_info
    }

    /// Realms from the last realm list response.
    pub fn realms(&self) -> &[Realm] {
        &self.realms
    }

    /// Present once authenticated, until taken or disconnected.
    pub const fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    /// Moves the session key out so the logon session no longer holds it.
    pub fn take_session_key(&mut self) -> Option<SessionKey> {
        self.session_key.take()
    }

    /// Whether the session failed because the server was too slow.
    pub const fn is_timed_out(&self) -> bool {
        self.timed_out
    }

    /// Sends the logon challenge.
    ///
    /// `security_code` is the PIN or authenticator token if the caller already knows the
    /// server will ask for one. Otherwise the session stops in
    /// [`LogonState::PinRequired`] or [`LogonState::AuthenticatorRequired`] until
    /// [`LogonSession::submit_security_code`] is called.
    ///
    /// # Errors
    ///
    /// Errors if the session is not in [`LogonState::Connected`], if the account name is
    /// not a valid [`NormalizedString`] or if the transport fails.
    pub fn authenticate(
        &mut self,
        account: &str,
        credentials: Credentials,
        security_code: Option<&str>,
    ) -> Result<(), SessionError> {
        if self.state != LogonState::Connected {
            return Err(SessionError::protocol(format!(
                "can not authenticate in state {}",
                self.state
            )));
        }

        let account = NormalizedString::new(account)
            .map_err(|e| SessionError::protocol(format!("invalid account name: {}", e)))?;

        info!(account = %account, "starting authentication");

        self.user = Some(SrpClientUser::new(
            account.clone(),
            credentials,
            self.srp_options,
        ));
        self.security_code = security_code.map(str::to_string);
        self.timed_out = false;
        self.deadline = Some(Instant::now() + AUTHENTICATION_TIMEOUT);

        let request = LogonChallengeRequest::new(&self.client_info, account);
        self.send(&request.write())?;
        self.state = LogonState::ChallengeSent;

        Ok(())
    }

    /// Supplies the PIN or authenticator token and continues with the proof if the session
    /// was waiting for it.
    ///
    /// # Errors
    ///
    /// Errors if the PIN is not 4 to 10 digits or the transport fails.
    pub fn submit_security_code(&mut self, code: &str) -> Result<(), SessionError> {
        self.security_code = Some(code.to_string());

        if self.state.is_waiting_for_code() {
            self.send_proof()
        } else {
            debug!(state = %self.state, "security code stored for later");
            Ok(())
        }
    }

    /// # Errors
    ///
    /// Errors if the session is not authenticated or the transport fails.
    pub fn request_realm_list(&mut self) -> Result<(), SessionError> {
        match self.state {
            LogonState::Authenticated | LogonState::RealmListReceived => {
                self.send(&RealmListRequest.write())?;
                self.state = LogonState::RealmListRequested;
                Ok(())
            }
            LogonState::RealmListRequested => {
                debug!("realm list already requested");
                Ok(())
            }
            state => Err(SessionError::protocol(format!(
                "can not request the realm list in state {}",
                state
            ))),
        }
    }

    /// Closes the transport, wipes the session key and clears the receive buffer.
    pub fn disconnect(&mut self) {
        self.transport.close();
        self.buffer.clear();
        if let Some(mut key) = self.session_key.take() {
            key.clear();
        }
        self.user = None;
        self.pending = None;
        self.security_code = None;
        self.deadline = None;
        self.state = LogonState::Disconnected;

        debug!("logon session disconnected");
    }

    /// [`LogonSession::update_at`] with the current time.
    ///
    /// # Errors
    ///
    /// See [`LogonSession::update_at`].
    pub fn update(&mut self) -> Result<(), SessionError> {
        self.update_at(Instant::now())
    }

    /// Reads from the transport, handles every complete message and checks the timeout.
    ///
    /// # Errors
    ///
    /// Returns the error that failed the session during this call. The same error is
    /// given to the failure callback.
    pub fn update_at(&mut self, now: Instant) -> Result<(), SessionError> {
        if matches!(self.state, LogonState::Disconnected | LogonState::Failed) {
            return Ok(());
        }

        if let Err(e) = self.transport.flush() {
            return Err(self.fail(e.into()));
        }

        let status = match read_available(&mut self.transport, &mut self.buffer) {
            Ok(status) => status,
            Err(e) => return Err(self.fail(e)),
        };

        self.process_frames()?;

        if status == ReadStatus::ClosedByPeer {
            self.peer_closed()?;
        }

        self.check_timeout(now)
    }

    fn process_frames(&mut self) -> Result<(), SessionError> {
        while !self.buffer.is_empty()
            && !matches!(self.state, LogonState::Failed | LogonState::Disconnected)
        {
            let length = match expected_length(&self.buffer, self.client_info.build) {
                Ok(FrameLength::Known(length)) if length <= self.buffer.len() => length,
                Ok(_) => break,
                Err(e) => return Err(self.fail(e)),
            };

            let frame: Vec<u8> = self.buffer.drain(..length).collect();
            self.handle_frame(&frame)?;
        }

        Ok(())
    }

    fn handle_frame(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        let opcode = frame.first().copied().and_then(LogonOpcode::from_u8);

        match (opcode, self.state) {
            (Some(LogonOpcode::LogonChallenge), LogonState::ChallengeSent) => {
                self.handle_challenge(frame)
            }
            (Some(LogonOpcode::LogonChallenge), _) => self.handle_stray_challenge(frame),
            (Some(LogonOpcode::LogonProof), LogonState::ProofSent) => self.handle_proof(frame),
            (Some(LogonOpcode::RealmList), LogonState::RealmListRequested) => {
                self.handle_realm_list(frame)
            }
            (opcode, state) => {
                warn!(?opcode, %state, "discarding unexpected logon message");
                Ok(())
            }
        }
    }

    fn handle_challenge(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        let response = match LogonChallengeResponse::read(frame) {
            Ok(response) => response,
            Err(e) => {
                debug!(%e, "unparseable challenge response");
                return Err(self.fail(SessionError::protocol(
                    "Server sent an invalid response - it may use an incompatible protocol version",
                )));
            }
        };

        let server = match response.challenge {
            Some(server) if response.result.is_success() => server,
            _ => {
                let result = response.result;
                let reason = if result.is_version_mismatch() {
                    let c = &self.client_info;
                    format!(
                        "LOGON_CHALLENGE failed: version mismatch (client v{}.{}.{} build {}, auth protocol {})",
                        c.major, c.minor, c.patch, c.build, c.protocol_version
                    )
                } else {
                    format!("LOGON_CHALLENGE failed: {}", result.message())
                };

                return Err(self.fail(SessionError::auth(result.as_u8(), reason)));
            }
        };

        let flags = server.security_flags;
        if !flags.is_empty() {
            warn!(
                flags = flags.as_u8(),
                pin = flags.pin(),
                matrix_card = flags.matrix_card(),
                authenticator = flags.authenticator(),
                "server requested extra security"
            );
        }
        debug!(
            g_len = server.generator.len(),
            n_len = server.large_safe_prime.len(),
            "received logon challenge"
        );

        if flags.matrix_card() {
            return Err(self.fail(SessionError::new(
                ErrorKind::Auth,
                "matrix card authentication is not supported",
            )));
        }

        let user = match self.user.take() {
            Some(user) => user,
            None => {
                return Err(
                    self.fail(SessionError::protocol("challenge received without credentials"))
                )
            }
        };
        #[cfg(test)]
        let user = match self.client_private_key {
            Some(key) => user.with_specific_private_key(key),
            None => user,
        };

        let challenge = match user.into_challenge(
            &server.generator,
            &server.large_safe_prime,
            server.server_public_key,
            server.salt,
        ) {
            Ok(challenge) => challenge,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.pending = Some(PendingProof { challenge, server });
        self.state = LogonState::ChallengeReceived;

        if (flags.pin() || flags.authenticator()) && self.security_code.is_none() {
            self.state = if flags.authenticator() {
                LogonState::AuthenticatorRequired
            } else {
                LogonState::PinRequired
            };
            info!(state = %self.state, "waiting for security code");
            return Ok(());
        }

        self.send_proof()
    }

    /// A challenge failure can arrive after the challenge was already answered.
    fn handle_stray_challenge(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        match LogonChallengeResponse::read(frame) {
            Ok(response) if !response.result.is_success() => {
                let waiting = if self.state.is_waiting_for_code() {
                    " while waiting for 2FA/PIN code"
                } else {
                    ""
                };
                let code = response.result.as_u8();
                let reason = format!(
                    "LOGON_CHALLENGE failed{}: {} (code 0x{:02X})",
                    waiting,
                    response.result.message(),
                    code
                );

                Err(self.fail(SessionError::auth(code, reason)))
            }
            _ => {
                warn!(state = %self.state, "discarding unexpected LOGON_CHALLENGE");
                Ok(())
            }
        }
    }

    fn send_proof(&mut self) -> Result<(), SessionError> {
        let (flags, pin_challenge, integrity_salt, client_public_key, client_proof) =
            match &self.pending {
                Some(p) => (
                    p.server.security_flags,
                    p.server.pin.unwrap_or_default(),
                    p.server.integrity_salt,
                    *p.challenge.client_public_key(),
                    *p.challenge.client_proof(),
                ),
                None => {
                    return Err(self.fail(SessionError::protocol("no logon challenge to answer")))
                }
            };

        let pin = if flags.pin() {
            let code = self.security_code.as_deref().unwrap_or_default();
            match pin::calculate_proof(code, pin_challenge.grid_seed, &pin_challenge.server_salt)
            {
                Some(proof) => Some(proof),
                None => {
                    return Err(self.fail(SessionError::new(
                        ErrorKind::Auth,
                        "PIN required but invalid: PIN must be 4 to 10 digits",
                    )))
                }
            }
        } else {
            None
        };

        let crc_hash = match &self.client_info.integrity_files {
            Some(files) => {
                login_integrity_check_generic(files, &integrity_salt, &client_public_key)
            }
            None => {
                debug!("no client files, sending a zeroed integrity hash");
                [0; 20]
            }
        };

        let request = LogonProofRequest {
            client_public_key,
            client_proof,
            crc_hash,
            security_flags: flags,
            pin,
        };
        self.send(&request.write(self.client_info.protocol_version))?;

        if flags.authenticator() && self.client_info.has_security_flags() {
            let token = AuthenticatorRequest {
                token: self.security_code.clone().unwrap_or_default(),
            };
            self.send(&token.write())?;
        }

        self.state = LogonState::ProofSent;
        debug!("sent logon proof");

        Ok(())
    }

    fn handle_proof(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        let response = match LogonProofResponse::read(frame, self.client_info.build) {
            Ok(response) => response,
            Err(e) => {
                debug!(%e, "unparseable proof response");
                return Err(self.fail(SessionError::protocol(
                    "Server sent an invalid login response - it may use an incompatible protocol",
                )));
            }
        };

        let server_proof = match response.server_proof {
            Some(server_proof) if response.result.is_success() => server_proof,
            _ => {
                let reason = format!("Login failed: {}", response.result.message());
                return Err(self.fail(SessionError::auth(response.result.as_u8(), reason)));
            }
        };

        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => return Err(self.fail(SessionError::protocol("no logon proof was sent"))),
        };

        match pending.challenge.verify_server_proof(server_proof) {
            Ok(client) => {
                self.session_key = Some(client.into_session_key());
                self.state = LogonState::Authenticated;
                self.deadline = None;
                self.security_code = None;

                info!("authenticated with logon server");

                if let Some(callback) = self.on_success.as_mut() {
                    callback();
                }
                Ok(())
            }
            Err(_) => Err(self.fail(SessionError::crypto(
                "Server identity verification failed - the server may be running an incompatible version",
            ))),
        }
    }

    fn handle_realm_list(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        let response = match RealmListResponse::read(frame, self.client_info.protocol_version) {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e)),
        };

        self.realms = response.realms;
        self.state = LogonState::RealmListReceived;

        info!(realms = self.realms.len(), "received realm list");
        for realm in &self.realms {
            debug!(
                name = %realm.name,
                address = %realm.address,
                id = realm.id,
                realm_type = %realm.realm_type,
                flags = realm.flags,
                "realm"
            );
        }

        if let Some(callback) = self.on_realm_list.as_mut() {
            callback(&self.realms);
        }

        Ok(())
    }

    fn peer_closed(&mut self) -> Result<(), SessionError> {
        if self.state.is_authenticating() || self.state == LogonState::RealmListRequested {
            return Err(self.fail(SessionError::transport("Disconnected by auth server")));
        }

        info!(state = %self.state, "logon server closed the connection");
        self.transport.close();
        self.state = LogonState::Disconnected;

        Ok(())
    }

    fn check_timeout(&mut self, now: Instant) -> Result<(), SessionError> {
        match self.deadline {
            Some(deadline) if now >= deadline && self.state.is_authenticating() => {
                self.timed_out = true;
                Err(self.fail(SessionError::new(
                    ErrorKind::Timeout,
                    format!(
                        "authentication timed out after {} seconds",
                        AUTHENTICATION_TIMEOUT.as_secs()
                    ),
                )))
            }
            _ => Ok(()),
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), SessionError> {
        if let Err(e) = self.transport.write_all(frame) {
            return Err(self.fail(e.into()));
        }
        Ok(())
    }

    fn fail(&mut self, e: SessionError) -> SessionError {
        error!(kind = %e.kind(), reason = e.reason(), "logon failed");

        self.state = LogonState::Failed;
        self.deadline = None;
        self.user = None;
        self.pending = None;

        if e.kind().closes_connection() {
            self.transport.close();
        }

        if let Some(callback) = self.on_failure.as_mut() {
            callback(&e);
        }

        e
    }
}

#[cfg(test)]
mod test {
    use crate::client::Credentials;
    use crate::config::ClientInfo;
    use crate::error::ErrorKind;
    use crate::key::PRIVATE_KEY_LENGTH;
    use crate::logon::packets::{
        LogonChallengeResponse, LogonProofResponse, PinChallenge, SecurityFlags,
        ServerChallenge,
    };
    use crate::logon::result::LogonResult;
    use crate::logon::session::{LogonSession, LogonState, AUTHENTICATION_TIMEOUT};
    use crate::primes::{GENERATOR, LARGE_SAFE_PRIME_LITTLE_ENDIAN};
    use crate::srp_internal::test::{vectors, Vector};
    use crate::transport::MemoryTransport;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Instant;

    fn vector() -> Vector {
        vectors()
            .into_iter()
            .find(|v| v.account.as_ref() == "TEST")
            .unwrap()
    }

    fn session(v: &Vector) -> (MemoryTransport, LogonSession<MemoryTransport>) {
        let peer = MemoryTransport::new();
        let key = <[u8; PRIVATE_KEY_LENGTH as usize]>::try_from(v.client_private_key.as_slice())
            .unwrap();
        let session = LogonSession::from_transport(peer.clone(), ClientInfo::default())
            .with_client_private_key(key);
        (peer, session)
    }

    fn challenge(v: &Vector, flags: SecurityFlags) -> Vec<u8> {
        LogonChallengeResponse {
            protocol_version: 0,
            result: LogonResult::Success,
            challenge: Some(ServerChallenge {
                server_public_key: *v.server_public_key.as_le(),
                generator: vec![GENERATOR],
                large_safe_prime: LARGE_SAFE_PRIME_LITTLE_ENDIAN.to_vec(),
                salt: *v.salt.as_le(),
                integrity_salt: [0; 16],
                security_flags: flags,
                pin: Some(PinChallenge {
                    grid_seed: 0x3ABC_1234,
                    server_salt: [0x77; 16],
                }),
                matrix_card: None,
                authenticator_required: Some(1),
            }),
        }
        .write()
    }

    fn proof(v: &Vector) -> Vec<u8> {
        LogonProofResponse {
            result: LogonResult::Success,
            server_proof: Some(*v.server_proof.as_le()),
            account_flags: 0,
            survey_id: 0,
            login_flags: 0,
        }
        .write(12340)
    }

    fn authenticate(session: &mut LogonSession<MemoryTransport>, code: Option<&str>) {
        session
            .authenticate("test", Credentials::password("password").unwrap(), code)
            .unwrap();
    }

    #[test]
    fn full_logon_matches_vector() {
        let v = vector();
        let (peer, mut session) = session(&v);

        let succeeded = Rc::new(Cell::new(false));
        let s = succeeded.clone();
        session.on_success(move || s.set(true));

        authenticate(&mut session, None);
        assert_eq!(session.state(), LogonState::ChallengeSent);
        let hello = peer.take_outbound();
        assert_eq!(hello[0], 0x00);
        assert_eq!(&hello[hello.len() - 4..], b"TEST");

        peer.push_inbound(&challenge(&v, SecurityFlags::NONE));
        session.update().unwrap();
        assert_eq!(session.state(), LogonState::ProofSent);

        let sent = peer.take_outbound();
        assert_eq!(sent.len(), 1 + 32 + 20 + 20 + 1 + 1);
        assert_eq!(sent[0], 0x01);
        assert_eq!(&sent[1..33], v.client_public_key.as_le());
        assert_eq!(&sent[33..53], v.client_proof.as_le());
        assert_eq!(&sent[53..73], &[0; 20]);

        peer.push_inbound(&proof(&v));
        session.update().unwrap();
        assert_eq!(session.state(), LogonState::Authenticated);
        assert!(succeeded.get());
        assert_eq!(session.session_key(), Some(&v.session_key));

        let key = session.take_session_key().unwrap();
        assert_eq!(key, v.session_key);
        assert!(session.session_key().is_none());
    }

    #[test]
    fn split_challenge_waits_for_the_rest() {
        let v = vector();
        let (peer, mut session) = session(&v);
        authenticate(&mut session, None);
        peer.take_outbound();

        let frame = challenge(&v, SecurityFlags::NONE);
        for part in frame.chunks(7) {
            assert_eq!(session.state(), LogonState::ChallengeSent);
            peer.push_inbound(part);
            session.update().unwrap();
        }

        assert_eq!(session.state(), LogonState::ProofSent);
    }

    #[test]
    fn pin_flag_waits_for_code() {
        let v = vector();
        let (peer, mut session) = session(&v);
        authenticate(&mut session, None);
        peer.take_outbound();

        peer.push_inbound(&challenge(&v, SecurityFlags::PIN));
        session.update().unwrap();
        assert_eq!(session.state(), LogonState::PinRequired);
        assert!(peer.take_outbound().is_empty());

        session.submit_security_code("1234").unwrap();
        assert_eq!(session.state(), LogonState::ProofSent);

        let sent = peer.take_outbound();
        assert_eq!(sent.len(), 1 + 32 + 20 + 20 + 1 + 1 + 16 + 20);
        assert_eq!(sent[74], 0x01);
    }

    #[test]
    fn invalid_pin_fails() {
        let v = vector();
        let (peer, mut session) = session(&v);
        authenticate(&mut session, Some("12"));

        peer.push_inbound(&challenge(&v, SecurityFlags::PIN));
        let e = session.update().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Auth);
        assert!(e.reason().starts_with("PIN required but invalid"));
        assert_eq!(session.state(), LogonState::Failed);
    }

    #[test]
    fn authenticator_takes_precedence_and_sends_token() {
        let v = vector();
        let (peer, mut session) = session(&v);
        authenticate(&mut session, None);
        peer.take_outbound();

        peer.push_inbound(&challenge(&v, SecurityFlags::PIN | SecurityFlags::AUTHENTICATOR));
        session.update().unwrap();
        assert_eq!(session.state(), LogonState::AuthenticatorRequired);

        session.submit_security_code("123456").unwrap();
        assert_eq!(session.state(), LogonState::ProofSent);

        let sent = peer.take_outbound();
        let proof_length = 1 + 32 + 20 + 20 + 1 + 1 + 16 + 20;
        assert_eq!(sent[74], 0x05);
        assert_eq!(&sent[proof_length..], b"\x04\x06123456");
    }

    #[test]
    fn wrong_server_proof_closes_connection() {
        let v = vector();
        let (peer, mut session) = session(&v);
        authenticate(&mut session, None);
        peer.push_inbound(&challenge(&v, SecurityFlags::NONE));
        session.update().unwrap();

        let mut bad = proof(&v);
        bad[2] ^= 0xFF;
        peer.push_inbound(&bad);

        let e = session.update().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Crypto);
        assert_eq!(
            e.reason(),
            "Server identity verification failed - the server may be running an incompatible version"
        );
        assert!(peer.is_closed());
        assert!(session.session_key().is_none());
    }

    #[test]
    fn matrix_card_is_unsupported() {
        let v = vector();
        let (peer, mut session) = session(&v);
        authenticate(&mut session, None);

        let mut frame = challenge(&v, SecurityFlags::NONE);
        // Flags are the last byte without extra blocks
        let last = frame.len() - 1;
        frame[last] = SecurityFlags::MATRIX_CARD.as_u8();
        frame.extend_from_slice(&[8, 10, 2, 3, 1, 2, 3, 4, 5, 6, 7, 8]);
        peer.push_inbound(&frame);

        let e = session.update().unwrap_err();
        assert_eq!(e.reason(), "matrix card authentication is not supported");
        assert_eq!(session.state(), LogonState::Failed);
    }

    #[test]
    fn times_out_ten_seconds_after_authenticate() {
        let v = vector();
        let (_peer, mut session) = session(&v);

        let failures = Rc::new(Cell::new(0));
        let f = failures.clone();
        session.on_failure(move |_| f.set(f.get() + 1));

        let start = Instant::now();
        authenticate(&mut session, None);

        session.update_at(start).unwrap();
        assert!(!session.is_timed_out());

        let e = session
            .update_at(start + AUTHENTICATION_TIMEOUT + AUTHENTICATION_TIMEOUT)
            .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Timeout);
        assert!(session.is_timed_out());
        assert_eq!(session.state(), LogonState::Failed);
        assert_eq!(failures.get(), 1);

        session.disconnect();
        assert_eq!(session.state(), LogonState::Disconnected);
    }
}
