//! The transaction coordinator: owns the request and response scratch
//! buffers for the lifetime of one request, dispatches to the UDP or TCP
//! path, and guarantees buffers are released and the busy flag cleared on
//! every exit.

use crate::code::{Code, Type};
use crate::error::Error;
use crate::host::{Host, Signal, Transport};
use crate::pdu::Pdu;
use crate::reliability::{self, RetryTiming};
use crate::request::{RequestDescriptor, ResponseResult};
use crate::{option, tcp, udp};

/// Configuration constants, overridable per `Handle` instead of at compile
/// time (a `Default`-implementing value stands in for the original's
/// `#define`s).
#[derive(Clone, Copy, Debug)]
pub struct Params {
    /// Capacity requested for each scratch buffer.
    pub max_pdu_size: u16,
    /// How long to wait for a separate response, once the exchange's ACK
    /// has arrived (or immediately, for TCP and Non-confirmable UDP).
    pub resp_timeout_ms: u32,
    /// Base wait for an ACK.
    pub ack_timeout_ms: u32,
    /// Maximum number of retransmissions.
    pub max_retransmit: u8,
    /// Jitter multiplier as a percentage.
    pub ack_random_factor_pct: u32,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_pdu_size: 96,
            resp_timeout_ms: 9000,
            ack_timeout_ms: 5000,
            max_retransmit: 3,
            ack_random_factor_pct: 130,
        }
    }
}

impl Params {
    fn retry_timing(&self) -> RetryTiming {
        RetryTiming {
            ack_timeout_ms: self.ack_timeout_ms,
            max_retransmit: self.max_retransmit,
            ack_random_factor_pct: self.ack_random_factor_pct,
            resp_timeout_ms: self.resp_timeout_ms,
        }
    }
}

/// One logical CoAP client bound to a single host and transport.
///
/// Holds no transaction state between calls to [`Handle::send_request`]
/// except the response buffer, which lives in `rx_buf` only so that
/// [`Handle::rx_byte`]/[`Handle::rx_packet`] have somewhere to deliver
/// bytes that arrive while the host is blocked inside `wait_event` (e.g.
/// fed in from a UART receive interrupt on platforms that hold the handle
/// in a static and call back into it).
pub struct Handle<H: Host> {
    host: H,
    transport: Transport,
    params: Params,
    sending: bool,
    waiting_resp: bool,
    debug: bool,
    rx_buf: Option<Pdu<H::Block>>,
}

impl<H: Host> Handle<H> {
    /// Builds a handle bound to one host and transport, with default
    /// timing parameters.
    pub fn new(host: H, transport: Transport) -> Self {
        Self::with_params(host, transport, Params::default())
    }

    /// Builds a handle with caller-supplied timing parameters.
    pub fn with_params(host: H, transport: Transport, params: Params) -> Self {
        Handle {
            host,
            transport,
            params,
            sending: false,
            waiting_resp: false,
            debug: false,
            rx_buf: None,
        }
    }

    /// Enables the host's debug-print hooks for subsequent requests.
    pub fn set_debug(&mut self, on: bool) {
        self.debug = on;
    }

    /// Appends one byte to the in-flight response buffer.
    ///
    /// Only valid while a transaction is waiting for a response, i.e.
    /// around the host's `wait_event` (a UART ISR feeding bytes in one at
    /// a time is the typical caller). Returns `WrongState` otherwise and
    /// `RxBuffFull` if the buffer is already at capacity.
    pub fn rx_byte(&mut self, byte: u8) -> Result<(), Error> {
        if !self.waiting_resp {
            return Err(Error::WrongState);
        }
        let buf = self.rx_buf.as_mut().ok_or(Error::WrongState)?;
        if !buf.push(byte) {
            self.host.signal(Signal::ResponseTooLong);
            return Err(Error::RxBuffFull);
        }
        self.host.signal(Signal::ReceivedByte);
        Ok(())
    }

    /// Overwrites the in-flight response buffer with a complete frame in
    /// one call, for hosts that assemble whole packets themselves (e.g. a
    /// modem's socket-read command).
    pub fn rx_packet(&mut self, frame: &[u8]) -> Result<(), Error> {
        if !self.waiting_resp {
            return Err(Error::WrongState);
        }
        let buf = self.rx_buf.as_mut().ok_or(Error::WrongState)?;
        if frame.len() > usize::from(buf.capacity()) {
            self.host.signal(Signal::ResponseTooLong);
            return Err(Error::RxBuffFull);
        }
        buf.set_len(0);
        for &b in frame {
            buf.push(b);
        }
        self.host.signal(Signal::ReceivedComplete);
        Ok(())
    }

    /// Sends one request and, if `descriptor.wants_response` is set, waits
    /// for and parses the response, delivering it to `on_response`.
    ///
    /// Every exit path — success, protocol failure, or resource failure —
    /// releases both scratch buffers and clears the busy flag before
    /// returning.
    pub fn send_request<F>(&mut self, descriptor: &RequestDescriptor<'_>, mut on_response: F) -> Result<(), Error>
    where
        F: FnMut(&ResponseResult<'_>),
    {
        if descriptor.code == Code::EMPTY && descriptor.tkl != 0 {
            return Err(Error::Param);
        }
        if self.sending {
            return Err(Error::Busy);
        }
        self.sending = true;
        self.host.signal(Signal::RoutineWillStart);

        let outcome = self.run(descriptor, &mut on_response);

        self.rx_buf = None;
        self.sending = false;
        self.waiting_resp = false;
        self.host.signal(Signal::RoutineDidFinish);
        outcome
    }

    fn run<F>(&mut self, descriptor: &RequestDescriptor<'_>, on_response: &mut F) -> Result<(), Error>
    where
        F: FnMut(&ResponseResult<'_>),
    {
        let mut request_block = self.host.alloc_block(self.params.max_pdu_size)?;

        let mut token_storage = [0u8; 8];
        let tkl = usize::from(descriptor.tkl);
        self.host.fill_token(&mut token_storage[..tkl]);

        let result = match self.transport {
            Transport::Udp => {
                self.run_udp(descriptor, request_block.as_mut(), &token_storage[..tkl], on_response)
            }
            Transport::Tcp => {
                self.run_tcp(descriptor, request_block.as_mut(), &token_storage[..tkl], on_response)
            }
            Transport::Sms => Err(Error::Param),
        };

        self.host.free_block(request_block);
        result
    }

    fn run_udp<F>(
        &mut self,
        descriptor: &RequestDescriptor<'_>,
        request_buf: &mut [u8],
        token: &[u8],
        on_response: &mut F,
    ) -> Result<(), Error>
    where
        F: FnMut(&ResponseResult<'_>),
    {
        let mid = self.host.next_message_id();
        let n = udp::assemble_request(
            request_buf,
            descriptor.type_,
            descriptor.code,
            mid,
            token,
            descriptor.options,
            descriptor.payload,
        );
        if self.debug {
            self.host.debug_print_packet(&request_buf[..n]);
        }
        self.host.transmit(&request_buf[..n])?;

        if !descriptor.wants_response {
            return Ok(());
        }

        let response_block = self.host.alloc_block(self.params.max_pdu_size)?;
        self.rx_buf = Some(Pdu::new(response_block));
        self.waiting_resp = true;

        let timing = self.params.retry_timing();
        let mut ack_scratch = [0u8; 4];

        let outcome = if descriptor.type_ == Type::Confirmable {
            let (buf, len) = self.rx_buf.as_mut().unwrap().split_mut();
            reliability::run_confirmable(
                &mut self.host,
                &timing,
                &request_buf[..n],
                buf,
                len,
                mid,
                descriptor.tkl,
                token,
                &mut ack_scratch,
            )
        } else {
            self.host
                .wait_event(self.params.resp_timeout_ms)
                .map_err(|_| Error::NoResp)
                .and_then(|()| {
                    let rx = self.rx_buf.as_ref().unwrap();
                    parse_non_confirmable(rx.as_slice(), mid, descriptor.tkl, token)
                })
        };

        let final_result = match outcome {
            Ok(Some(r)) => {
                on_response(&r);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        };

        self.waiting_resp = false;

        let block = self.rx_buf.take().unwrap().into_block();
        self.host.free_block(block);
        final_result
    }

    fn run_tcp<F>(
        &mut self,
        descriptor: &RequestDescriptor<'_>,
        request_buf: &mut [u8],
        token: &[u8],
        on_response: &mut F,
    ) -> Result<(), Error>
    where
        F: FnMut(&ResponseResult<'_>),
    {
        let n = tcp::assemble_request(request_buf, descriptor.code, token, descriptor.options, descriptor.payload);
        if self.debug {
            self.host.debug_print_packet(&request_buf[..n]);
        }
        self.host.transmit(&request_buf[..n])?;

        if !descriptor.wants_response {
            return Ok(());
        }

        let response_block = self.host.alloc_block(self.params.max_pdu_size)?;
        self.rx_buf = Some(Pdu::new(response_block));
        self.waiting_resp = true;

        let outcome = self
            .host
            .wait_event(self.params.resp_timeout_ms)
            .map_err(|_| Error::NoResp)
            .and_then(|()| {
                let rx = self.rx_buf.as_ref().unwrap();
                let frame = rx.as_slice();
                let (code, classification, opts_start) = tcp::parse_response(frame, descriptor.tkl, token)?;
                let (options, payload_start) = option::decode(&frame[opts_start..])?;
                Ok(ResponseResult {
                    code,
                    classification,
                    payload: &frame[opts_start + payload_start..],
                    options,
                })
            });

        let final_result = match outcome {
            Ok(r) => {
                on_response(&r);
                Ok(())
            }
            Err(e) => Err(e),
        };

        self.waiting_resp = false;

        let block = self.rx_buf.take().unwrap().into_block();
        self.host.free_block(block);
        final_result
    }
}

/// A Non-confirmable request has no ACK to wait through, so the only
/// frame the host can have delivered into the response buffer by the time
/// `wait_event` returns is the separate response itself.
fn parse_non_confirmable<'a>(
    frame: &'a [u8],
    request_mid: u16,
    request_tkl: u8,
    request_token: &[u8],
) -> Result<Option<ResponseResult<'a>>, Error> {
    let (disposition, code, opts_start) = udp::parse_response(frame, request_mid, request_tkl, request_token)?;

    match disposition {
        udp::Disposition::SeparateNoAck { classification } | udp::Disposition::SeparateNeedsAck { classification } => {
            let (options, payload_start) = option::decode(&frame[opts_start..])?;
            Ok(Some(ResponseResult {
                code,
                classification,
                payload: &frame[opts_start + payload_start..],
                options,
            }))
        }
        _ => Err(Error::NoResp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::test_support::MockHost;

    #[test]
    fn params_default_matches_configuration_table() {
        let p = Params::default();
        assert_eq!(p.max_pdu_size, 96);
        assert_eq!(p.resp_timeout_ms, 9000);
        assert_eq!(p.ack_timeout_ms, 5000);
        assert_eq!(p.max_retransmit, 3);
        assert_eq!(p.ack_random_factor_pct, 130);
    }

    #[test]
    fn busy_flag_rejects_reentrant_send() {
        let host = MockHost::new();
        let mut handle = Handle::new(host, Transport::Udp);
        handle.sending = true;

        let descriptor = RequestDescriptor {
            type_: Type::NonConfirmable,
            code: crate::code::Method::Get.into(),
            tkl: 0,
            payload: &[],
            options: &[],
            wants_response: false,
        };

        assert_eq!(handle.send_request(&descriptor, |_| {}).unwrap_err(), Error::Busy);
    }

    #[test]
    fn empty_code_with_nonzero_tkl_is_rejected() {
        let host = MockHost::new();
        let mut handle = Handle::new(host, Transport::Udp);
        let descriptor = RequestDescriptor {
            type_: Type::NonConfirmable,
            code: Code::EMPTY,
            tkl: 2,
            payload: &[],
            options: &[],
            wants_response: false,
        };
        assert_eq!(handle.send_request(&descriptor, |_| {}).unwrap_err(), Error::Param);
    }

    #[test]
    fn fire_and_forget_non_confirmable_never_waits() {
        let host = MockHost::new();
        let mut handle = Handle::new(host, Transport::Udp);
        let descriptor = RequestDescriptor {
            type_: Type::NonConfirmable,
            code: crate::code::Method::Get.into(),
            tkl: 0,
            payload: &[],
            options: &[],
            wants_response: false,
        };
        handle.send_request(&descriptor, |_| panic!("no response expected")).unwrap();
        assert_eq!(handle.host.sent.len(), 1);
    }

    #[test]
    fn confirmable_request_with_empty_response_buffer_reports_protocol_error() {
        let mut host = MockHost::new();
        host.token_byte = 0xAA;
        host.wait_results.push(Ok(()));
        let mut handle = Handle::new(host, Transport::Udp);

        let descriptor = RequestDescriptor {
            type_: Type::Confirmable,
            code: crate::code::Method::Get.into(),
            tkl: 1,
            payload: &[],
            options: &[],
            wants_response: true,
        };

        // `MockHost::wait_event` returns `Ok` without delivering any bytes,
        // so the response buffer is still empty when parsed; what's under
        // test here is that exactly one wait happens (no retransmission
        // for a scripted success) and that the handle cleans up its state
        // regardless of the parse failure that follows.
        let result = handle.send_request(&descriptor, |_| {});
        assert!(result.is_err());
        assert!(!handle.sending);
        assert!(!handle.waiting_resp);
        assert!(handle.rx_buf.is_none());
    }
}
