//! Scripted serial driver for unit tests
//!
//! Requests are recorded on a [`MockLine`]; the test decides when and how
//! each one completes.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use pinserial_hal::{DataChunk, DriverEvent, OpenOptions, SerialConnection, SerialDriver};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MockError(pub &'static str);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MockRequest {
    Write(Vec<u8>),
    Flush,
    Drain,
    Close,
}

struct LineState {
    port: String,
    options: OpenOptions,
    auto_complete: bool,
    requests: Vec<MockRequest>,
    answered: usize,
    events: VecDeque<DriverEvent<MockError>>,
    /// Once set and drained, `poll_event` reports the end of the stream
    ended: bool,
    waker: Option<Waker>,
}

/// Test-side view of one connection
#[derive(Clone)]
pub(crate) struct MockLine {
    state: Rc<RefCell<LineState>>,
}

impl MockLine {
    pub(crate) fn port(&self) -> String {
        self.state.borrow().port.clone()
    }

    pub(crate) fn options(&self) -> OpenOptions {
        self.state.borrow().options
    }

    pub(crate) fn requests(&self) -> Vec<MockRequest> {
        self.state.borrow().requests.clone()
    }

    /// Queue a raw driver event
    pub(crate) fn inject(&self, event: DriverEvent<MockError>) {
        let waker = {
            let mut state = self.state.borrow_mut();
            state.events.push_back(event);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// End the event stream without a `Closed` event
    pub(crate) fn end(&self) {
        let waker = {
            let mut state = self.state.borrow_mut();
            state.ended = true;
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn complete_open(&self) {
        self.inject(DriverEvent::Opened(Ok(())));
    }

    pub(crate) fn fail_open(&self, error: MockError) {
        self.inject(DriverEvent::Opened(Err(error)));
    }

    pub(crate) fn receive(&self, bytes: &[u8]) {
        let chunk = DataChunk::from_slice(bytes).expect("mock chunk too large");
        self.inject(DriverEvent::Data(chunk));
    }

    pub(crate) fn report_error(&self, error: MockError) {
        self.inject(DriverEvent::Error(error));
    }

    /// Complete the oldest unanswered request successfully
    pub(crate) fn complete_next(&self) -> MockRequest {
        self.answer_next(Ok(()))
    }

    /// Fail the oldest unanswered request
    pub(crate) fn fail_next(&self, error: MockError) -> MockRequest {
        self.answer_next(Err(error))
    }

    fn answer_next(&self, result: Result<(), MockError>) -> MockRequest {
        let request = {
            let mut state = self.state.borrow_mut();
            let request = state
                .requests
                .get(state.answered)
                .cloned()
                .expect("no unanswered request");
            state.answered += 1;
            request
        };
        self.inject(completion_for(&request, result));
        request
    }
}

fn completion_for(request: &MockRequest, result: Result<(), MockError>) -> DriverEvent<MockError> {
    match request {
        MockRequest::Write(_) => DriverEvent::Written(result),
        MockRequest::Flush => DriverEvent::Flushed(result),
        MockRequest::Drain => DriverEvent::Drained(result),
        MockRequest::Close => DriverEvent::Closed(result),
    }
}

pub(crate) struct MockConnection {
    line: MockLine,
}

impl MockConnection {
    fn request(&mut self, request: MockRequest) {
        let auto = {
            let mut state = self.line.state.borrow_mut();
            state.requests.push(request.clone());
            state.auto_complete
        };
        if auto {
            self.line.complete_next();
        }
    }
}

impl SerialConnection for MockConnection {
    type Error = MockError;

    fn write(&mut self, data: &[u8]) {
        self.request(MockRequest::Write(data.to_vec()));
    }

    fn flush(&mut self) {
        self.request(MockRequest::Flush);
    }

    fn drain(&mut self) {
        self.request(MockRequest::Drain);
    }

    fn close(&mut self) {
        self.request(MockRequest::Close);
    }

    fn try_event(&mut self) -> Option<DriverEvent<MockError>> {
        self.line.state.borrow_mut().events.pop_front()
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<DriverEvent<MockError>>> {
        let mut state = self.line.state.borrow_mut();
        match state.events.pop_front() {
            Some(event) => Poll::Ready(Some(event)),
            None if state.ended => Poll::Ready(None),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

/// Driver handing out scripted connections
///
/// Clones share the recorded lines, so a test keeps one clone and gives
/// the other to the peripheral.
#[derive(Clone, Default)]
pub(crate) struct MockDriver {
    lines: Rc<RefCell<Vec<MockLine>>>,
    auto_complete: bool,
}

impl MockDriver {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Driver whose connections open and answer every request immediately
    pub(crate) fn auto() -> Self {
        Self {
            auto_complete: true,
            ..Self::default()
        }
    }

    pub(crate) fn connection_count(&self) -> usize {
        self.lines.borrow().len()
    }

    pub(crate) fn line(&self, index: usize) -> MockLine {
        self.lines.borrow()[index].clone()
    }

    pub(crate) fn last_line(&self) -> MockLine {
        self.lines.borrow().last().cloned().expect("no connection opened")
    }
}

impl SerialDriver for MockDriver {
    type Error = MockError;
    type Connection = MockConnection;

    fn open_connection(&mut self, port: &str, options: &OpenOptions) -> MockConnection {
        let line = MockLine {
            state: Rc::new(RefCell::new(LineState {
                port: port.to_owned(),
                options: *options,
                auto_complete: self.auto_complete,
                requests: Vec::new(),
                answered: 0,
                events: VecDeque::new(),
                ended: false,
                waker: None,
            })),
        };
        if self.auto_complete {
            line.complete_open();
        }
        self.lines.borrow_mut().push(line.clone());
        MockConnection { line }
    }

    fn disconnected(&self) -> MockError {
        MockError("disconnected")
    }
}
