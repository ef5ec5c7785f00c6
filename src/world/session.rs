//! Client side of a world server connection.
//!
//! ```text
//! Connecting -> Connected -> ChallengeReceived -> AuthSent -> Authenticated -> Ready
//!     -> CharListRequested -> CharListReceived -> EnteringWorld -> InWorld
//! ```
//!
//! Any step can end in `Failed`.
//!
//! The session interprets the handshake, the character list, the world entry and the
//! heartbeat. Every other packet goes to the handler registered for its opcode with
//! [`WorldSession::register_handler`]. Handlers answer through an [`Outbox`], which is
//! written before the next frame is parsed.

use crate::config::{ClientInfo, WorldOptions};
use crate::error::SessionError;
use crate::key::SessionKey;
use crate::normalized_string::NormalizedString;
use crate::packet::Packet;
use crate::transport::{read_available, ReadStatus, TcpTransport, Transport};
use crate::world::framing::WorldFramer;
use crate::world::opcodes::{
    self, CMSG_WARDEN_DATA, SMSG_AUTH_CHALLENGE, SMSG_AUTH_RESPONSE, SMSG_CHAR_ENUM,
    SMSG_COMPRESSED_UPDATE_OBJECT, SMSG_LOGIN_VERIFY_WORLD, SMSG_PONG, SMSG_UPDATE_OBJECT,
    SMSG_WARDEN_DATA,
};
use crate::world::packets::{
    calculate_auth_digest, character_list_request, decompress_update, empty_addon_info, ping,
    player_login, read_character_list, read_pong, AuthChallenge, AuthResponse, AuthSession,
    Character, LoginVerifyWorld,
};
use crate::world::result::WorldAuthResult;
use rand::random;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Where a [`WorldSession`] is in the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorldState {
    Disconnected,
    Connecting,
    Connected,
    ChallengeReceived,
    AuthSent,
    Authenticated,
    Ready,
    CharListRequested,
    CharListReceived,
    EnteringWorld,
    InWorld,
    Failed,
}

impl WorldState {
    const fn is_authenticated(self) -> bool {
        matches!(
            self,
            Self::Authenticated
                | Self::Ready
                | Self::CharListRequested
                | Self::CharListReceived
                | Self::EnteringWorld
                | Self::InWorld
        )
    }
}

impl Display for WorldState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorldState::Disconnected => "Disconnected",
            WorldState::Connecting => "Connecting",
            WorldState::Connected => "Connected",
            WorldState::ChallengeReceived => "ChallengeReceived",
            WorldState::AuthSent => "AuthSent",
            WorldState::Authenticated => "Authenticated",
            WorldState::Ready => "Ready",
            WorldState::CharListRequested => "CharListRequested",
            WorldState::CharListReceived => "CharListReceived",
            WorldState::EnteringWorld => "EnteringWorld",
            WorldState::InWorld => "InWorld",
            WorldState::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Packets queued by a handler.
#[derive(Debug, Default)]
pub struct Outbox {
    packets: Vec<Packet>,
}

impl Outbox {
    pub fn send(&mut self, packet: Packet) {
        self.packets.push(packet);
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

type Handler = Box<dyn FnMut(&Packet, &mut Outbox)>;

struct PendingPing {
    sequence: u32,
    sent: Instant,
}

/// World server connection.
pub struct WorldSession<T: Transport = TcpTransport> {
    transport: T,
    framer: WorldFramer,
    client_info: ClientInfo,
    options: WorldOptions,
    account: NormalizedString,
    session_key: SessionKey,
    state: WorldState,
    client_seed: u32,
    challenge: Option<AuthChallenge>,
    queue_position: Option<u32>,
    characters: Vec<Character>,
    handlers: HashMap<u16, Handler>,
    outbox: Outbox,
    warden_unanswered: u32,
    ping_sequence: u32,
    pending_ping: Option<PendingPing>,
    latency: u32,
    next_ping: Option<Instant>,
    now: Instant,
    on_auth_success: Option<Box<dyn FnMut()>>,
    on_failure: Option<Box<dyn FnMut(&SessionError)>>,
    on_character_list: Option<Box<dyn FnMut(&[Character])>>,
    on_enter_world: Option<Box<dyn FnMut(&LoginVerifyWorld)>>,
}

impl WorldSession<TcpTransport> {
    /// Connects to the world server of the selected realm.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the connection fails and a protocol error if `account`
    /// is not a valid account name.
    pub fn connect(
        host: &str,
        port: u16,
        session_key: SessionKey,
        account: &str,
        client_info: ClientInfo,
        options: WorldOptions,
    ) -> Result<Self, SessionError> {
        debug!(host, port, state = %WorldState::Connecting, "connecting to world server");

        let transport = TcpTransport::connect(host, port).map_err(|e| {
            SessionError::transport(format!("could not connect to {}:{}: {}", host, port, e))
        })?;

        info!(host, port, "connected to world server");

        Self::from_transport(transport, session_key, account, client_info, options)
    }
}

impl<T: Transport> WorldSession<T> {
    /// Session over an already connected transport. Takes ownership of the session key.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if `account` is not a valid account name.
    pub fn from_transport(
        transport: T,
        session_key: SessionKey,
        account: &str,
        client_info: ClientInfo,
        options: WorldOptions,
    ) -> Result<Self, SessionError> {
        let account = NormalizedString::new(account)
            .map_err(|e| SessionError::protocol(format!("invalid account name: {}", e)))?;

        Ok(Self {
            transport,
            framer: WorldFramer::new(),
            client_info,
            options,
            account,
            session_key,
            state: WorldState::Connected,
            client_seed: random(),
            challenge: None,
            queue_position: None,
            characters: Vec::new(),
            handlers: HashMap::new(),
            outbox: Outbox::default(),
            warden_unanswered: 0,
            ping_sequence: 0,
            pending_ping: None,
            latency: 0,
            next_ping: None,
            now: Instant::now(),
            on_auth_success: None,
            on_failure: None,
            on_character_list: None,
            on_enter_world: None,
        })
    }

    /// Called for every packet with `opcode` that the session does not interpret itself.
    ///
    /// Replaces any earlier handler for the same opcode.
    pub fn register_handler(
        &mut self,
        opcode: u16,
        handler: impl FnMut(&Packet, &mut Outbox) + 'static,
    ) {
        self.handlers.insert(opcode, Box::new(handler));
    }

    /// Called when the server accepts `CMSG_AUTH_SESSION`.
    pub fn on_auth_success(&mut self, callback: impl FnMut() + 'static) {
        self.on_auth_success = Some(Box::new(callback));
    }

    /// Called once when the session fails, with the same error that is returned.
    pub fn on_failure(&mut self, callback: impl FnMut(&SessionError) + 'static) {
        self.on_failure = Some(Box::new(callback));
    }

    pub fn on_character_list(&mut self, callback: impl FnMut(&[Character]) + 'static) {
        self.on_character_list = Some(Box::new(callback));
    }

    /// Called with the spawn point once the character is in the world.
    pub fn on_enter_world(&mut self, callback: impl FnMut(&LoginVerifyWorld) + 'static) {
        self.on_enter_world = Some(Box::new(callback));
    }

    pub const fn state(&self) -> WorldState {
        self.state
    }

    pub const fn client_seed(&self) -> u32 {
        self.client_seed
    }

    /// Seed from `SMSG_AUTH_CHALLENGE`, once received.
    pub fn server_seed(&self) -> Option<u32> {
        self.challenge.map(|c| c.server_seed)
    }

    /// Last position reported by `SMSG_AUTH_RESPONSE` while queued.
    pub const fn queue_position(&self) -> Option<u32> {
        self.queue_position
    }

    /// Characters from the last `SMSG_CHAR_ENUM`.
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    /// Round trip of the last answered ping in milliseconds.
    pub const fn latency(&self) -> u32 {
        self.latency
    }

    pub const fn is_encrypted(&self) -> bool {
        self.framer.is_encrypted()
    }

    /// Whether enough `SMSG_WARDEN_DATA` went unanswered that the server is holding the
    /// session back.
    pub const fn is_warden_gated(&self) -> bool {
        self.options.warden_gate_threshold != 0
            && self.warden_unanswered >= self.options.warden_gate_threshold
    }

    /// Sends `CMSG_CHAR_ENUM`.
    ///
    /// # Errors
    ///
    /// Errors if the session is not ready, is gated by Warden or the transport fails.
    pub fn request_character_list(&mut self) -> Result<(), SessionError> {
        self.check_gate("request the character list")?;

        match self.state {
            WorldState::Ready | WorldState::CharListReceived => {
                self.send_packet(&character_list_request())?;
                self.state = WorldState::CharListRequested;
                Ok(())
            }
            WorldState::CharListRequested => {
                debug!("character list already requested");
                Ok(())
            }
            state => Err(SessionError::protocol(format!(
                "can not request the character list in state {}",
                state
            ))),
        }
    }

    /// Sends `CMSG_PLAYER_LOGIN` for `guid`.
    ///
    /// # Errors
    ///
    /// Errors if no character list has been received, the session is gated by Warden or the
    /// transport fails.
    pub fn select_character(&mut self, guid: u64) -> Result<(), SessionError> {
        self.check_gate("select a character")?;

        if self.state != WorldState::CharListReceived {
            return Err(SessionError::protocol(format!(
                "can not select a character in state {}",
                self.state
            )));
        }

        if !self.characters.iter().any(|c| c.guid == guid) {
            warn!(guid, "selected character is not in the character list");
        }

        self.send_packet(&player_login(guid))?;
        self.state = WorldState::EnteringWorld;
        info!(guid, "entering world");

        Ok(())
    }

    /// Sends a packet built by the consumer.
    ///
    /// # Errors
    ///
    /// Errors if the session is not authenticated, the packet is too large or the transport
    /// fails.
    pub fn send(&mut self, packet: &Packet) -> Result<(), SessionError> {
        if !self.state.is_authenticated() {
            return Err(SessionError::protocol(format!(
                "can not send 0x{:03X} in state {}",
                packet.opcode(),
                self.state
            )));
        }

        self.send_packet(packet)
    }

    /// Closes the transport, wipes the session key and clears all buffers.
    pub fn disconnect(&mut self) {
        self.transport.close();
        self.framer.clear();
        self.session_key.clear();
        self.outbox.packets.clear();
        self.pending_ping = None;
        self.next_ping = None;
        self.state = WorldState::Disconnected;

        debug!("world session disconnected");
    }

    /// [`WorldSession::update_at`] with the current time.
    ///
    /// # Errors
    ///
    /// See [`WorldSession::update_at`].
    pub fn update(&mut self) -> Result<(), SessionError> {
        self.update_at(Instant::now())
    }

    /// Reads from the transport, handles every complete packet and sends a ping when due.
    ///
    /// # Errors
    ///
    /// Returns the error that failed the session during this call. The same error is
    /// given to the failure callback.
    pub fn update_at(&mut self, now: Instant) -> Result<(), SessionError> {
        if matches!(self.state, WorldState::Disconnected | WorldState::Failed) {
            return Ok(());
        }
        self.now = now;

        if let Err(e) = self.transport.flush() {
            return Err(self.fail(e.into()));
        }

        let status = match read_available(&mut self.transport, self.framer.buffer_mut()) {
            Ok(status) => status,
            Err(e) => return Err(self.fail(e)),
        };

        self.process_frames()?;

        if status == ReadStatus::ClosedByPeer {
            return Err(self.fail(SessionError::transport("Disconnected by world server")));
        }

        self.send_ping_if_due()
    }

    fn process_frames(&mut self) -> Result<(), SessionError> {
        while !matches!(self.state, WorldState::Failed | WorldState::Disconnected) {
            let packet = match self.framer.next_frame() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(e) => return Err(self.fail(e)),
            };

            trace!(
                opcode = packet.opcode(),
                name = opcodes::name(packet.opcode()).unwrap_or("unknown"),
                size = packet.len(),
                "received world packet"
            );

            self.handle_packet(packet)?;
            self.flush_outbox()?;
        }

        Ok(())
    }

    fn handle_packet(&mut self, packet: Packet) -> Result<(), SessionError> {
        match (packet.opcode(), self.state) {
            (SMSG_AUTH_CHALLENGE, WorldState::Connected) => self.handle_auth_challenge(&packet),
            (SMSG_AUTH_RESPONSE, WorldState::AuthSent) => self.handle_auth_response(&packet),
            (SMSG_CHAR_ENUM, WorldState::CharListRequested) => self.handle_char_enum(&packet),
            (SMSG_LOGIN_VERIFY_WORLD, WorldState::EnteringWorld) => {
                self.handle_login_verify_world(&packet)
            }
            (SMSG_PONG, _) => {
                self.handle_pong(&packet);
                Ok(())
            }
            (SMSG_COMPRESSED_UPDATE_OBJECT, _) => {
                match decompress_update(packet.data()) {
                    Ok(body) => self.route(&Packet::with_data(SMSG_UPDATE_OBJECT, body)),
                    Err(e) => warn!(%e, "dropping compressed update"),
                }
                Ok(())
            }
            (SMSG_WARDEN_DATA, _) => {
                self.warden_unanswered += 1;
                if self.is_warden_gated() {
                    warn!(
                        unanswered = self.warden_unanswered,
                        "Warden data is unanswered, session is gated"
                    );
                } else {
                    debug!(unanswered = self.warden_unanswered, "received Warden data");
                }
                self.route(&packet);
                Ok(())
            }
            (
                SMSG_AUTH_CHALLENGE | SMSG_AUTH_RESPONSE | SMSG_CHAR_ENUM | SMSG_LOGIN_VERIFY_WORLD,
                state,
            ) => {
                warn!(opcode = packet.opcode(), %state, "discarding unexpected world packet");
                Ok(())
            }
            _ => {
                self.route(&packet);
                Ok(())
            }
        }
    }

    fn route(&mut self, packet: &Packet) {
        match self.handlers.get_mut(&packet.opcode()) {
            Some(handler) => handler(packet, &mut self.outbox),
            None => trace!(opcode = packet.opcode(), "no handler registered"),
        }
    }

    fn handle_auth_challenge(&mut self, packet: &Packet) -> Result<(), SessionError> {
        let challenge = match AuthChallenge::read(packet) {
            Ok(challenge) => challenge,
            Err(e) => return Err(self.fail(e)),
        };
        self.challenge = Some(challenge);
        self.state = WorldState::ChallengeReceived;
        debug!(wotlk = challenge.unknown.is_some(), "received auth challenge");

        let addon_info = match empty_addon_info() {
            Ok(addon_info) => addon_info,
            Err(e) => return Err(self.fail(e.into())),
        };

        let session = AuthSession {
            build: u32::from(self.client_info.build),
            realm_id: self.options.realm_id,
            account: self.account.clone(),
            client_seed: self.client_seed,
            digest: calculate_auth_digest(
                &self.account,
                self.client_seed,
                challenge.server_seed,
                &self.session_key,
            ),
            addon_info,
        };

        self.send_packet(&session.to_packet(self.client_info.build))?;
        self.framer
            .enable_encryption(&self.session_key, self.client_info.build);
        self.state = WorldState::AuthSent;

        debug!("sent auth session, header encryption enabled");

        Ok(())
    }

    fn handle_auth_response(&mut self, packet: &Packet) -> Result<(), SessionError> {
        let response = match AuthResponse::read(packet) {
            Ok(response) => response,
            Err(e) => return Err(self.fail(e)),
        };

        match response.result {
            WorldAuthResult::Ok => {
                self.state = WorldState::Authenticated;
                self.queue_position = None;
                info!("authenticated with world server");

                self.state = WorldState::Ready;
                if let Some(callback) = self.on_auth_success.as_mut() {
                    callback();
                }
                Ok(())
            }
            WorldAuthResult::WaitQueue => {
                self.queue_position = response.queue_position;
                info!(position = ?response.queue_position, "waiting in login queue");
                Ok(())
            }
            result => Err(self.fail(SessionError::auth(result.as_u8(), result.message()))),
        }
    }

    fn handle_char_enum(&mut self, packet: &Packet) -> Result<(), SessionError> {
        self.characters = match read_character_list(packet) {
            Ok(characters) => characters,
            Err(e) => return Err(self.fail(e)),
        };
        self.state = WorldState::CharListReceived;

        info!(characters = self.characters.len(), "received character list");
        for character in &self.characters {
            debug!(
                guid = character.guid,
                name = %character.name,
                level = character.level,
                "character"
            );
        }

        if let Some(callback) = self.on_character_list.as_mut() {
            callback(&self.characters);
        }

        Ok(())
    }

    fn handle_login_verify_world(&mut self, packet: &Packet) -> Result<(), SessionError> {
        let spawn = match LoginVerifyWorld::read(packet) {
            Ok(spawn) => spawn,
            Err(e) => return Err(self.fail(e)),
        };

        self.state = WorldState::InWorld;
        self.next_ping = Some(self.now + self.options.ping_interval);

        info!(
            map = spawn.map,
            x = spawn.x,
            y = spawn.y,
            z = spawn.z,
            "entered world"
        );

        if let Some(callback) = self.on_enter_world.as_mut() {
            callback(&spawn);
        }

        Ok(())
    }

    fn handle_pong(&mut self, packet: &Packet) {
        let sequence = match read_pong(packet) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(%e, "ignoring pong");
                return;
            }
        };

        match self.pending_ping.take() {
            Some(pending) if pending.sequence == sequence => {
                let elapsed = self.now.saturating_duration_since(pending.sent);
                self.latency = u32::try_from(elapsed.as_millis()).unwrap_or(u32::MAX);
                trace!(sequence, latency = self.latency, "pong");
            }
            pending => {
                warn!(
                    received = sequence,
                    expected = ?pending.as_ref().map(|p| p.sequence),
                    "pong does not match the last ping"
                );
                self.pending_ping = pending;
            }
        }
    }

    fn send_ping_if_due(&mut self) -> Result<(), SessionError> {
        match self.next_ping {
            Some(due) if self.state == WorldState::InWorld && self.now >= due => {}
            _ => return Ok(()),
        }

        let sequence = self.ping_sequence;
        self.send_packet(&ping(sequence, self.latency))?;

        self.ping_sequence = self.ping_sequence.wrapping_add(1);
        self.pending_ping = Some(PendingPing {
            sequence,
            sent: self.now,
        });
        self.next_ping = Some(self.now + self.options.ping_interval.max(Duration::from_millis(1)));

        Ok(())
    }

    fn check_gate(&self, action: &str) -> Result<(), SessionError> {
        if self.is_warden_gated() {
            return Err(SessionError::protocol(format!(
                "can not {} while Warden data is unanswered",
                action
            )));
        }
        Ok(())
    }

    fn flush_outbox(&mut self) -> Result<(), SessionError> {
        let packets = std::mem::take(&mut self.outbox.packets);

        for packet in &packets {
            if !self.state.is_authenticated() {
                warn!(
                    opcode = packet.opcode(),
                    state = %self.state,
                    "dropping packet queued before authentication"
                );
                continue;
            }
            self.send_packet(packet)?;
        }

        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> Result<(), SessionError> {
        let frame = self.framer.encode(packet)?;

        if let Err(e) = self.transport.write_all(&frame) {
            return Err(self.fail(e.into()));
        }

        if packet.opcode() == CMSG_WARDEN_DATA {
            self.warden_unanswered = 0;
        }

        trace!(
            opcode = packet.opcode(),
            name = opcodes::name(packet.opcode()).unwrap_or("unknown"),
            size = packet.len(),
            "sent world packet"
        );

        Ok(())
    }

    fn fail(&mut self, e: SessionError) -> SessionError {
        error!(kind = %e.kind(), reason = e.reason(), "world session failed");

        self.state = WorldState::Failed;
        self.next_ping = None;
        self.pending_ping = None;

        if e.kind().closes_connection() {
            self.transport.close();
        }

        if let Some(callback) = self.on_failure.as_mut() {
            callback(&e);
        }

        e
    }
}
