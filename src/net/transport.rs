use core::{
    sync::atomic::{self, AtomicBool},
    time::Duration,
};
use std::{
    io,
    net::{Shutdown, TcpStream, ToSocketAddrs},
    sync::{
        mpsc::{self, Receiver, SendError, Sender, TryRecvError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use log::*;
use thiserror::Error;

use super::{
    server_io::{LineWriteErr, MessagePollErr, ServerIo},
    tls,
};
use crate::{
    connection::{ConnectionId, ConnectionState, ServerInfo},
    ext::ReadWrite,
    handlers::Dispatcher,
    irc::{ClientCommand, ClientCommandErr, IrcMessage},
    store::{Action, Store},
};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

// how long the IO thread sleeps when there was nothing to read or write
const POLL_DELAY: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ConnectErr {
    #[error(transparent)]
    Network(#[from] io::Error),
    #[error("TLS error: {}", .0)]
    Tls(#[from] rustls::Error),
    #[error("{:?} is not a valid server name", .0)]
    InvalidServerName(String),
    #[error("the connection is already open")]
    AlreadyConnected,
    #[error("the connection was closed while connecting")]
    Aborted,
}

#[derive(Debug, Error)]
pub enum TransportErr {
    #[error("not connected")]
    NotConnected,
    #[error("the connection was closed")]
    Closed,
    #[error("line contains a line break")]
    InvalidLine,
    #[error(transparent)]
    InvalidCommand(#[from] ClientCommandErr),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
enum IoLoopErr {
    #[error(transparent)]
    Poll(#[from] MessagePollErr),
    #[error(transparent)]
    Io(#[from] io::Error),
}

enum Outgoing {
    Line(String),
    /// closes the connection once everything queued before it was written
    Close(Sender<Result<(), TransportErr>>),
}

struct Worker {
    /// taken once a close was requested
    outgoing: Option<Sender<Outgoing>>,
    shutdown: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// owns the stream of one connection. all reading, writing and dispatching happens on a
/// dedicated thread, so lines are handled strictly in the order they arrived.
pub struct Transport {
    id: ConnectionId,
    store: Store,
    worker: Option<Worker>,
}

impl Transport {
    pub fn new(id: ConnectionId, store: Store) -> Self {
        Self {
            id,
            store,
            worker: None,
        }
    }

    /// whether the IO thread is still running, which includes connecting and closing
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|w| !w.thread.is_finished())
    }

    /// blocks until the IO thread stopped, and with it reported `Disconnected`. returns false if
    /// it is still running after `timeout`.
    pub fn wait_stopped(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_running() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(POLL_DELAY);
        }
        if let Some(worker) = self.worker.take() {
            if worker.thread.join().is_err() {
                error!("the IO thread of {} panicked", self.id);
            }
        }
        true
    }

    /// opens the connection and registers. the receiver gets the result once the stream is open
    /// and the registration was sent, or connecting failed.
    pub fn connect(&mut self, server: &ServerInfo) -> Receiver<Result<(), ConnectErr>> {
        let (done, receiver) = mpsc::channel();
        if self.is_running() {
            let _ = done.send(Err(ConnectErr::AlreadyConnected));
            return receiver;
        }
        // the previous thread stopped, only its handle is left
        self.wait_stopped(Duration::ZERO);

        self.store.dispatch(Action::SetConnectionState {
            connection: self.id,
            state: ConnectionState::Connecting,
        });

        let (outgoing, queue) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let io_thread = IoThread {
            id: self.id,
            store: self.store.clone(),
            server: server.clone(),
            queue,
            shutdown: Arc::clone(&shutdown),
        };

        let spawned = thread::Builder::new()
            .name(format!("io-{}", self.id))
            .spawn(move || io_thread.run(done));
        match spawned {
            Ok(thread) => {
                self.worker = Some(Worker {
                    outgoing: Some(outgoing),
                    shutdown,
                    thread,
                });
            }
            Err(e) => {
                error!("could not start the IO thread for {}: {}", self.id, e);
                self.store.dispatch(Action::SetConnectionState {
                    connection: self.id,
                    state: ConnectionState::Disconnected,
                });
                let (done, receiver) = mpsc::channel();
                let _ = done.send(Err(ConnectErr::Network(e)));
                return receiver;
            }
        }

        receiver
    }

    pub fn send(&self, command: &ClientCommand) -> Result<(), TransportErr> {
        let line = command.irc_str()?;
        self.send_line(&line)
    }

    /// queues a line for writing. the CRLF is added by the transport.
    pub fn send_line(&self, line: &str) -> Result<(), TransportErr> {
        if line.contains(['\r', '\n']) {
            return Err(TransportErr::InvalidLine);
        }
        let Some(outgoing) = self.worker.as_ref().and_then(|w| w.outgoing.as_ref()) else {
            return Err(TransportErr::NotConnected);
        };
        outgoing
            .send(Outgoing::Line(line.to_string()))
            .map_err(|_| TransportErr::Closed)
    }

    /// closes the connection after everything already queued was written. calling this when
    /// already disconnected, or already closing, completes immediately. use
    /// [`Transport::wait_stopped`] to wait for a close that is in progress.
    pub fn disconnect(&mut self) -> Receiver<Result<(), TransportErr>> {
        let (done, receiver) = mpsc::channel();
        let Some(outgoing) = self.worker.as_mut().and_then(|w| w.outgoing.take()) else {
            let _ = done.send(Ok(()));
            return receiver;
        };

        if let Err(SendError(Outgoing::Close(done))) = outgoing.send(Outgoing::Close(done)) {
            // the IO thread already exited
            let _ = done.send(Ok(()));
        }
        receiver
    }

    /// stops the IO thread without waiting for it
    pub fn terminate(&mut self) {
        if let Some(worker) = &mut self.worker {
            debug!("terminating {}", self.id);
            worker.outgoing = None;
            worker.shutdown.store(true, atomic::Ordering::Release);
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        // a requested close still gets to write what was queued before it
        if self.worker.as_ref().is_some_and(|w| w.outgoing.is_some()) {
            self.terminate();
        }
    }
}

struct IoThread {
    id: ConnectionId,
    store: Store,
    server: ServerInfo,
    queue: Receiver<Outgoing>,
    shutdown: Arc<AtomicBool>,
}

impl IoThread {
    fn run(self, done: Sender<Result<(), ConnectErr>>) {
        let (mut io, socket) = match self.open() {
            Ok(opened) => opened,
            Err(e) => {
                warn!("could not connect to {}: {}", self.server.address(), e);
                self.store.dispatch(Action::ErrorReceived {
                    connection: self.id,
                    text: format!("could not connect to {}: {}", self.server.address(), e),
                });
                self.finish();
                let _ = done.send(Err(e));
                return;
            }
        };
        info!("connected to {}", self.server.address());
        let _ = done.send(Ok(()));

        let close_reply = match self.io_loop(&mut io) {
            Ok(reply) => reply,
            Err(e) => {
                let text = match &e {
                    IoLoopErr::Poll(MessagePollErr::Closed) => {
                        String::from("the server closed the connection")
                    }
                    e => format!("connection lost: {}", e),
                };
                warn!("{}: {}", self.id, text);
                self.store.dispatch(Action::ErrorReceived {
                    connection: self.id,
                    text,
                });
                None
            }
        };

        if let Err(e) = socket.shutdown(Shutdown::Both) {
            // the other side may have closed it already
            debug!("socket shutdown for {}: {}", self.id, e);
        }
        drop(io);
        self.finish();
        if let Some(reply) = close_reply {
            let _ = reply.send(Ok(()));
        }
    }

    fn finish(&self) {
        self.store.dispatch(Action::SetConnectionState {
            connection: self.id,
            state: ConnectionState::Disconnected,
        });
    }

    // connects, and sends the registration. the returned socket is only kept to shut the
    // connection down.
    fn open(&self) -> Result<(ServerIo, TcpStream), ConnectErr> {
        let stream = connect_any(&self.server.host, self.server.port)?;
        if self.shutdown.load(atomic::Ordering::Acquire) {
            return Err(ConnectErr::Aborted);
        }
        let socket = stream.try_clone()?;

        let connection: Box<dyn ReadWrite + Send> = if self.server.secure {
            Box::new(tls::connect(
                stream,
                &self.server.host,
                self.server.tls_verification,
            )?)
        } else {
            // set non-blocking so that reads and writes can happen on one thread
            stream.set_nonblocking(true)?;
            Box::new(stream)
        };

        let mut io = ServerIo::new(connection);
        for command in registration(&self.server) {
            // only fails for user input with line breaks
            let line = command
                .irc_str()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            write(&mut io, &line)?;
        }
        Ok((io, socket))
    }

    // returns the reply channel of a requested close, if the loop ended because of one
    fn io_loop(
        &self,
        io: &mut ServerIo,
    ) -> Result<Option<Sender<Result<(), TransportErr>>>, IoLoopErr> {
        let dispatcher = Dispatcher::new(self.id, self.store.clone());

        loop {
            if self.shutdown.load(atomic::Ordering::Acquire) {
                debug!("{} was terminated", self.id);
                return Ok(None);
            }

            let mut idle = true;

            // write any queued lines
            loop {
                match self.queue.try_recv() {
                    Ok(Outgoing::Line(line)) => {
                        write(io, &line)?;
                        idle = false;
                    }
                    Ok(Outgoing::Close(reply)) => return Ok(Some(reply)),
                    // if empty, move on to try to read
                    Err(TryRecvError::Empty) => break,
                    // the transport was dropped without terminating
                    Err(TryRecvError::Disconnected) => return Ok(None),
                }
            }

            for line in io.recv()? {
                idle = false;
                let msg = IrcMessage::parse(&line);
                trace!("{} got {:?}", self.id, msg);
                for reply in dispatcher.handle(&msg) {
                    match reply.irc_str() {
                        Ok(line) => write(io, &line)?,
                        Err(e) => warn!("dropping reply {:?}: {}", reply, e),
                    }
                }
            }

            if idle {
                thread::sleep(POLL_DELAY);
            }
        }
    }
}

// writes a line that was validated already. only IO errors end the connection.
fn write(io: &mut ServerIo, line: &str) -> io::Result<()> {
    match io.write_line(line) {
        Ok(()) => Ok(()),
        Err(LineWriteErr::LineBreak(line)) => {
            warn!("not sending line with a line break: {:?}", line);
            Ok(())
        }
        Err(LineWriteErr::Io(e)) => Err(e),
    }
}

// tries every address the host resolves to
fn connect_any(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in (host, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("could not connect to {}: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} did not resolve to any address", host),
        )
    }))
}

/// the commands that register a connection, in the order they must be sent
pub fn registration(server: &ServerInfo) -> Vec<ClientCommand> {
    let mut commands = Vec::with_capacity(3);
    if let Some(password) = &server.password {
        commands.push(ClientCommand::Pass(password.clone()));
    }
    commands.push(ClientCommand::Nick(server.nick.clone()));
    commands.push(ClientCommand::User {
        username: server.username.clone(),
        real_name: server.real_name.clone(),
    });
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::test_server;

    #[test]
    fn registration_order() {
        let lines = registration(&test_server())
            .iter()
            .map(|c| c.irc_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(lines, vec!["NICK me", "USER me 0 * :Real Me"]);

        let mut server = test_server();
        server.password = Some(String::from("hunter2"));
        let lines = registration(&server)
            .iter()
            .map(|c| c.irc_str().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(lines, vec!["PASS hunter2", "NICK me", "USER me 0 * :Real Me"]);
    }

    #[test]
    fn send_without_connection() {
        let (store, _events) = Store::new();
        let transport = Transport::new(ConnectionId::new(1), store);
        assert!(matches!(
            transport.send_line("PING x"),
            Err(TransportErr::NotConnected)
        ));
        assert!(matches!(
            transport.send_line("PING x\r\nQUIT"),
            Err(TransportErr::InvalidLine)
        ));
        assert!(matches!(
            transport.send(&ClientCommand::Nick(String::from("a b"))),
            Err(TransportErr::InvalidCommand(_))
        ));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (store, _events) = Store::new();
        let mut transport = Transport::new(ConnectionId::new(1), store);
        assert!(matches!(transport.disconnect().recv(), Ok(Ok(()))));
        assert!(matches!(transport.disconnect().recv(), Ok(Ok(()))));
        assert!(transport.wait_stopped(Duration::ZERO));
        transport.terminate();
    }

    #[test]
    fn stopping_reports_disconnected_first() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let mut server = test_server();
        server.port = listener.local_addr().unwrap().port();
        let (store, _events) = Store::new();
        store.dispatch(Action::AddConnection {
            connection: ConnectionId::new(1),
            server: server.clone(),
        });

        let mut transport = Transport::new(ConnectionId::new(1), store.clone());
        let connected = transport.connect(&server);
        let (_peer, _) = listener.accept().unwrap();
        assert!(matches!(connected.recv(), Ok(Ok(()))));

        // nobody waits for the close, but the thread is only gone once it reported it
        drop(transport.disconnect());
        assert!(transport.wait_stopped(CONNECT_TIMEOUT));
        assert!(!transport.is_running());
        assert_eq!(
            store.connection(ConnectionId::new(1)).unwrap().state,
            ConnectionState::Disconnected
        );
    }
}
