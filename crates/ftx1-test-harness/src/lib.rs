//! Mock transport for deterministic testing of the CAT engine.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. This lets you test CAT command generation and
//! response parsing without real hardware.
//!
//! The mock's state lives behind an [`Arc`], so a [`MockController`] cloned
//! before the transport is handed to the link keeps working afterwards --
//! tests use it to queue additional expectations and to inject unsolicited
//! AI frames into the receive path.
//!
//! # Example
//!
//! ```
//! use ftx1_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! let ctl = mock.controller();
//! // Pre-load: when the engine sends this request, return this response.
//! ctl.expect(b"FA;", b"FA014074000;");
//! ```

pub mod mock_transport;

pub use mock_transport::{MockController, MockTransport};
