// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use rosc::{
    address::{Matcher, OscAddress},
    OscMessage, OscPacket, OscType,
};
use tokio::{net::UdpSocket, sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::clips::TriggerKey;
use crate::config;
use crate::playback::PlayRequest;

/// A driver that fires triggers from OSC messages received over UDP.
///
/// A message whose address matches the configured pattern fires the key named
/// by its first string argument. Without a string argument the last segment of
/// the address is used, so `/trigger/tamil` fires `tamil` when the pattern is
/// `/trigger/*`.
pub struct Driver {
    /// The socket address to listen on.
    addr: SocketAddr,
    /// Matches addresses that fire a trigger.
    matcher: Arc<Matcher>,
}

impl Driver {
    pub fn new(config: &config::OscTrigger) -> Result<Arc<Self>, Box<dyn Error>> {
        let addr: SocketAddr = format!("{}:{}", config.bind(), config.port()).parse()?;
        Ok(Arc::new(Driver {
            addr,
            matcher: Arc::new(Matcher::new(config.address())?),
        }))
    }

    /// Collects the keys fired by a packet. Bundles are walked recursively.
    pub(super) fn packet_keys(matcher: &Matcher, packet: &OscPacket, keys: &mut Vec<TriggerKey>) {
        match packet {
            OscPacket::Message(msg) => {
                if let Some(key) = Self::message_key(matcher, msg) {
                    keys.push(key);
                }
            }
            OscPacket::Bundle(bundle) => {
                for packet in &bundle.content {
                    Self::packet_keys(matcher, packet, keys);
                }
            }
        }
    }

    fn message_key(matcher: &Matcher, msg: &OscMessage) -> Option<TriggerKey> {
        let address = match OscAddress::new(msg.addr.clone()) {
            Ok(address) => address,
            Err(e) => {
                debug!(addr = %msg.addr, err = %e, "Invalid OSC address.");
                return None;
            }
        };
        if !matcher.match_address(&address) {
            return None;
        }

        let from_args = msg.args.iter().find_map(|arg| match arg {
            OscType::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        });
        let key = from_args.or_else(|| {
            msg.addr
                .rsplit('/')
                .next()
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
        })?;
        Some(TriggerKey::new(key))
    }
}

impl Driver {
    /// Receives packets until the request receiver goes away.
    async fn listen(
        addr: SocketAddr,
        matcher: Arc<Matcher>,
        events_tx: Sender<PlayRequest>,
    ) -> Result<(), io::Error> {
        let socket = UdpSocket::bind(addr).await?;
        info!(addr = %addr, "OSC driver started.");

        let mut buf = [0u8; rosc::decoder::MTU];
        let mut keys = Vec::new();
        loop {
            let (size, sender_addr) = match socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    error!(err = e.to_string(), "Error receiving UDP.");
                    continue;
                }
            };
            let packet = match rosc::decoder::decode_udp(&buf[..size]) {
                Ok((_, packet)) => packet,
                Err(e) => {
                    error!(err = e.to_string(), "Error decoding OSC message");
                    continue;
                }
            };

            let now = Instant::now();
            keys.clear();
            Self::packet_keys(&matcher, &packet, &mut keys);
            for key in keys.drain(..) {
                debug!(key = %key, from = %sender_addr, "OSC trigger.");
                if events_tx.send(PlayRequest::trigger(key, now)).await.is_err() {
                    info!("Request receiver closed, OSC driver stopping.");
                    return Ok(());
                }
            }
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<PlayRequest>) -> JoinHandle<Result<(), io::Error>> {
        tokio::spawn(
            Self::listen(self.addr, self.matcher.clone(), events_tx)
                .instrument(span!(Level::INFO, "OSC driver")),
        )
    }
}
