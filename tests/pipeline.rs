//! End-to-end pipeline tests: bytes in, callbacks out, and back again.

use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use hex_literal::hex;
use lazy_static::lazy_static;

use bytes::BytesMut;
use ldapstack::{
    install_allocator, opcode, stages, Cursor, Endpoint, EndpointConfig, ErrorKind, HeapPools,
    MsgId, OpRegistry, Opcode, Pool, PoolAlloc, PoolProvider,
};

lazy_static! {
    // the pool provider is process-wide; serialize tests that install one
    static ref TEST_LOCK: Mutex<()> = Mutex::new(());
}

fn lock() -> MutexGuard<'static, ()> {
    let _ = env_logger::builder().is_test(true).try_init();
    TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

// A provider that counts how many pools were created and ended, for the
// arena-lifecycle assertions.
struct CountingPools {
    created: Arc<std::sync::atomic::AtomicUsize>,
    ended: Arc<std::sync::atomic::AtomicUsize>,
}

struct CountingPool {
    ended: Arc<std::sync::atomic::AtomicUsize>,
}

impl PoolAlloc for CountingPool {
    fn alloc(&mut self, size: usize) -> Option<BytesMut> {
        Some(BytesMut::with_capacity(size))
    }
}

impl Drop for CountingPool {
    fn drop(&mut self) {
        self.ended.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

impl PoolProvider for CountingPools {
    fn newpool(&self) -> Option<Box<dyn PoolAlloc>> {
        self.created.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Some(Box::new(CountingPool {
            ended: self.ended.clone(),
        }))
    }
}

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.lock().expect("sink lock"))
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("sink lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// Reader that doles the input out in fixed-size chunks, for the framing
// invariants under arbitrary read boundaries.
struct ChunkReader {
    data: Vec<u8>,
    at: usize,
    chunk: usize,
}

impl ChunkReader {
    fn new(data: Vec<u8>, chunk: usize) -> ChunkReader {
        ChunkReader { data, at: 0, chunk }
    }
}

impl Read for ChunkReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let left = self.data.len() - self.at;
        let n = left.min(self.chunk).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.at..self.at + n]);
        self.at += n;
        Ok(n)
    }
}

type Event = (MsgId, Opcode, Vec<Option<Vec<u8>>>);
type Events = Arc<Mutex<Vec<Event>>>;

fn recording_handler(
    events: &Events,
) -> impl Fn(&mut Endpoint, Pool, MsgId, Opcode, &[Cursor], &Cursor) -> ldapstack::Result<()>
       + Send
       + Sync
       + 'static {
    let events = events.clone();
    move |_lil, pool, msgid, opcode, data, _controls| {
        let fields = data
            .iter()
            .map(|c| {
                if c.is_null() {
                    None
                } else {
                    Some(c.as_slice().to_vec())
                }
            })
            .collect();
        events.lock().expect("events lock").push((msgid, opcode, fields));
        pool.end();
        Ok(())
    }
}

fn catchall_config(events: &Events) -> Arc<EndpointConfig> {
    let mut registry = OpRegistry::new();
    for op in 0..opcode::OPCODE_COUNT as Opcode {
        registry = registry.at(op, recording_handler(events));
    }
    Arc::new(EndpointConfig {
        registry,
        ..EndpointConfig::default()
    })
}

fn run_get(lil: &mut Endpoint) -> ldapstack::Result<()> {
    loop {
        match lil.get_event() {
            Ok(0) => return Ok(()),
            Ok(_) => (),
            Err(e) => return Err(e),
        }
    }
}

fn run_put(lil: &mut Endpoint) {
    loop {
        match lil.put_event() {
            Ok(_) => (),
            Err(e) if e.kind() == ErrorKind::Retry => return,
            Err(e) => panic!("put_event failed: {}", e),
        }
    }
}

fn bind_request_frame() -> Vec<u8> {
    let mut v = hex!("30 20 02 01 01 60 1b 02 01 03 04 0e").to_vec();
    v.extend_from_slice(b"cn=admin,dc=ex");
    v.extend_from_slice(&hex!("80 06"));
    v.extend_from_slice(b"secret");
    v
}

fn unbind_frame() -> Vec<u8> {
    hex!("30 05 02 01 02 42 00").to_vec()
}

fn search_request_frame() -> Vec<u8> {
    let mut v = hex!("30 2a 02 01 03 63 25 04 05").to_vec();
    v.extend_from_slice(b"dc=ex");
    v.extend_from_slice(&hex!("0a 01 02 0a 01 00 02 01 00 02 01 00 01 01 00 87 0b"));
    v.extend_from_slice(b"objectClass");
    v.extend_from_slice(&hex!("30 00"));
    v
}

fn search_entry_frame() -> Vec<u8> {
    let mut v = hex!("30 13 02 01 03 64 0e 04 0a").to_vec();
    v.extend_from_slice(b"cn=a,dc=ex");
    v.extend_from_slice(&hex!("30 00"));
    v
}

fn search_done_frame() -> Vec<u8> {
    hex!("30 0c 02 01 03 65 07 0a 01 00 04 00 04 00").to_vec()
}

fn modify_request_frame() -> Vec<u8> {
    let mut v = hex!("30 0e 02 01 05 66 09 04 05").to_vec();
    v.extend_from_slice(b"dc=ex");
    v.extend_from_slice(&hex!("30 00"));
    v
}

fn starttls_request_frame() -> Vec<u8> {
    let mut v = hex!("30 1d 02 01 01 77 18 80 16").to_vec();
    v.extend_from_slice(b"1.3.6.1.4.1.1466.20037");
    v
}

fn unknown_exop_frame() -> Vec<u8> {
    let mut v = hex!("30 10 02 01 02 77 0b 80 09").to_vec();
    v.extend_from_slice(b"1.2.3.4.5");
    v
}

#[test]
fn bind_then_unbind() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let events: Events = Default::default();
    let mut lil = Endpoint::new(catchall_config(&events)).expect("endpoint");
    let mut input = bind_request_frame();
    input.extend(unbind_frame());
    lil.attach(io::Cursor::new(input), SharedSink::default());
    run_get(&mut lil).expect("pipeline");

    let events = events.lock().expect("events lock");
    assert_eq!(events.len(), 2);
    let (msgid, op, fields) = &events[0];
    assert_eq!((*msgid, *op), (1, opcode::BIND_REQUEST));
    assert_eq!(fields[0].as_deref(), Some(&[0x03][..]));
    assert_eq!(fields[1].as_deref(), Some(&b"cn=admin,dc=ex"[..]));
    assert_eq!(fields[2].as_deref(), Some(&b"secret"[..]));
    assert_eq!(fields[3], None);
    let (msgid, op, _) = &events[1];
    assert_eq!((*msgid, *op), (2, opcode::UNBIND_REQUEST));
}

#[test]
fn search_with_entries_and_done() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let events: Events = Default::default();
    let mut lil = Endpoint::new(catchall_config(&events)).expect("endpoint");
    let mut input = search_request_frame();
    input.extend(search_entry_frame());
    input.extend(search_entry_frame());
    input.extend(search_done_frame());
    lil.attach(io::Cursor::new(input), SharedSink::default());
    run_get(&mut lil).expect("pipeline");

    let events = events.lock().expect("events lock");
    assert_eq!(events.len(), 4);
    let (msgid, op, fields) = &events[0];
    assert_eq!((*msgid, *op), (3, opcode::SEARCH_REQUEST));
    assert_eq!(fields[0].as_deref(), Some(&b"dc=ex"[..]));
    assert_eq!(fields[1].as_deref(), Some(&[0x02][..]));
    assert_eq!(fields[2].as_deref(), Some(&[0x00][..]));
    // the filter comes through as one raw element
    let mut filter = hex!("87 0b").to_vec();
    filter.extend_from_slice(b"objectClass");
    assert_eq!(fields[6].as_deref(), Some(&filter[..]));
    assert_eq!(fields[7].as_deref(), Some(&b""[..]));
    assert_eq!(events[1].1, opcode::SEARCH_RESULT_ENTRY);
    assert_eq!(events[2].1, opcode::SEARCH_RESULT_ENTRY);
    let (msgid, op, fields) = &events[3];
    assert_eq!((*msgid, *op), (3, opcode::SEARCH_RESULT_DONE));
    assert_eq!(fields[0].as_deref(), Some(&[0x00][..]));
    assert_eq!(fields[1].as_deref(), Some(&b""[..]));
    assert_eq!(fields[2].as_deref(), Some(&b""[..]));
}

#[test]
fn rejected_modify_fires_no_callback_and_frees_the_pool() {
    let _g = lock();
    let created = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let ended = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    install_allocator(Arc::new(CountingPools {
        created: created.clone(),
        ended: ended.clone(),
    }));
    let events: Events = Default::default();
    let mut lil = Endpoint::new(catchall_config(&events)).expect("endpoint");
    lil.reject(opcode::MODIFY_REQUEST);
    lil.attach(io::Cursor::new(modify_request_frame()), SharedSink::default());
    let err = run_get(&mut lil).expect_err("rejected");
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(lil.last_error(), Some(ErrorKind::Unsupported));
    assert!(events.lock().expect("events lock").is_empty());
    drop(lil);
    assert_eq!(
        created.load(std::sync::atomic::Ordering::SeqCst),
        ended.load(std::sync::atomic::Ordering::SeqCst),
        "every pool ended exactly once"
    );
    install_allocator(Arc::new(HeapPools));
}

#[test]
fn starttls_remaps_away_from_the_extended_slot() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let events: Events = Default::default();
    let hits: Events = Default::default();
    // a registry with distinct extended-request and starttls slots
    let registry = OpRegistry::new()
        .at(opcode::EXTENDED_REQUEST, recording_handler(&hits))
        .at(opcode::STARTTLS_REQUEST, recording_handler(&events));
    let config = Arc::new(EndpointConfig {
        registry,
        ..EndpointConfig::default()
    });
    let mut lil = Endpoint::new(config).expect("endpoint");
    lil.attach(
        io::Cursor::new(starttls_request_frame()),
        SharedSink::default(),
    );
    run_get(&mut lil).expect("pipeline");

    assert!(hits.lock().expect("events lock").is_empty());
    let events = events.lock().expect("events lock");
    assert_eq!(events.len(), 1);
    let (msgid, op, fields) = &events[0];
    assert_eq!((*msgid, *op), (1, opcode::STARTTLS_REQUEST));
    assert_eq!(fields[0].as_deref(), Some(&b"1.3.6.1.4.1.1466.20037"[..]));
    assert_eq!(fields[1], None);
}

#[test]
fn unknown_extended_oid_leaves_the_endpoint_usable() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let events: Events = Default::default();
    let mut lil = Endpoint::new(catchall_config(&events)).expect("endpoint");
    lil.attach(io::Cursor::new(unknown_exop_frame()), SharedSink::default());
    let err = run_get(&mut lil).expect_err("unknown OID");
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert!(events.lock().expect("events lock").is_empty());

    // the next well-formed message dispatches normally
    lil.attach(io::Cursor::new(bind_request_frame()), SharedSink::default());
    run_get(&mut lil).expect("pipeline");
    let events = events.lock().expect("events lock");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, opcode::BIND_REQUEST);
}

#[test]
fn overlong_length_prefix_is_malformed() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let events: Events = Default::default();
    let mut lil = Endpoint::new(catchall_config(&events)).expect("endpoint");
    lil.attach(
        io::Cursor::new(hex!("30 85 01 01 01 01 01").to_vec()),
        SharedSink::default(),
    );
    let err = run_get(&mut lil).expect_err("length of length");
    assert_eq!(err.kind(), ErrorKind::Malformed);
}

#[test]
fn wrong_top_tag_is_malformed() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let events: Events = Default::default();
    let mut lil = Endpoint::new(catchall_config(&events)).expect("endpoint");
    lil.attach(
        io::Cursor::new(hex!("31 05 02 01 01 42 00").to_vec()),
        SharedSink::default(),
    );
    let err = run_get(&mut lil).expect_err("top tag");
    assert_eq!(err.kind(), ErrorKind::Malformed);
}

#[test]
fn passthrough_reproduces_the_stream_across_chunkings() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let mut input = bind_request_frame();
    input.extend(search_request_frame());
    input.extend(search_entry_frame());
    input.extend(search_done_frame());
    input.extend(unbind_frame());

    for chunk in [1usize, 2, 3, 5, 7, 64, 4096] {
        let config = Arc::new(EndpointConfig {
            // frames go straight back out
            get_dercursor: Some(stages::put_dercursor),
            ..EndpointConfig::default()
        });
        let mut lil = Endpoint::new(config).expect("endpoint");
        let sink = SharedSink::default();
        lil.attach(ChunkReader::new(input.clone(), chunk), sink.clone());
        run_get(&mut lil).expect("pipeline");
        run_put(&mut lil);
        assert_eq!(sink.take(), input, "chunk size {}", chunk);
        assert!(!lil.can_send());
    }
}

#[test]
fn responses_prefer_the_response_bank() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let requests: Events = Default::default();
    let responses: Events = Default::default();
    let config = Arc::new(EndpointConfig {
        registry: OpRegistry::new().at(opcode::BIND_RESPONSE, recording_handler(&requests)),
        responses: Some(
            OpRegistry::new().at(opcode::BIND_RESPONSE, recording_handler(&responses)),
        ),
        ..EndpointConfig::default()
    });
    let mut lil = Endpoint::new(config).expect("endpoint");
    lil.attach(
        io::Cursor::new(hex!("30 0c 02 01 01 61 07 0a 01 00 04 00 04 00").to_vec()),
        SharedSink::default(),
    );
    run_get(&mut lil).expect("pipeline");
    assert!(requests.lock().expect("events lock").is_empty());
    assert_eq!(responses.lock().expect("events lock").len(), 1);
}

#[test]
fn simple_bind_emits_the_expected_frame() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    let mut lil = Endpoint::new(Arc::new(EndpointConfig::default())).expect("endpoint");
    let sink = SharedSink::default();
    lil.attach(io::Cursor::new(Vec::new()), sink.clone());
    let msgid = lil.simple_bind("cn=admin,dc=ex", "secret").expect("bind");
    assert_ne!(msgid & ldapstack::OUTBOUND, 0);
    assert!(lil.msgids().lookup(msgid));
    assert!(lil.can_send());
    run_put(&mut lil);
    // the first id this endpoint allocates is 1, so the frame matches
    // the handcrafted one byte for byte
    assert_eq!(sink.take(), bind_request_frame());
    lil.msgids().free(msgid);
    assert!(!lil.msgids().lookup(msgid));
}

// Every sample goes out through the encoder, in through the decoder, and
// out through the encoder again; the two byte streams must be identical
// and the parsed fields must survive unchanged. Extended operations come
// back under their remapped opcodes, which the re-encode then uses.
#[test]
fn encode_decode_encode_is_identity_across_the_opcode_space() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));

    type Sample = (Opcode, Vec<Option<Vec<u8>>>);
    fn s(op: Opcode, fields: &[Option<&[u8]>]) -> Sample {
        (op, fields.iter().map(|f| f.map(|v| v.to_vec())).collect())
    }
    let filter: Vec<u8> = {
        let mut v = hex!("87 0b").to_vec();
        v.extend_from_slice(b"objectClass");
        v
    };
    let samples: Vec<Sample> = vec![
        s(opcode::BIND_REQUEST, &[
            Some(&[3]),
            Some(b"cn=admin,dc=ex"),
            Some(b"secret"),
            None,
            None,
        ]),
        s(opcode::BIND_REQUEST, &[
            Some(&[3]),
            Some(b"uid=u"),
            None,
            Some(b"GSSAPI"),
            Some(b"token"),
        ]),
        s(opcode::BIND_RESPONSE, &[
            Some(&[0]),
            Some(b""),
            Some(b""),
            None,
            Some(b"srv"),
        ]),
        s(opcode::UNBIND_REQUEST, &[Some(b"")]),
        s(opcode::SEARCH_REQUEST, &[
            Some(b"dc=ex"),
            Some(&[2]),
            Some(&[0]),
            Some(&[0]),
            Some(&[0]),
            Some(&[0]),
            Some(&filter),
            Some(b""),
        ]),
        s(opcode::SEARCH_RESULT_ENTRY, &[Some(b"cn=a,dc=ex"), Some(b"")]),
        s(opcode::SEARCH_RESULT_DONE, &[Some(&[0]), Some(b""), Some(b""), None]),
        s(opcode::MODIFY_REQUEST, &[Some(b"dc=ex"), Some(b"")]),
        s(opcode::MODIFY_RESPONSE, &[Some(&[0]), Some(b""), Some(b""), None]),
        s(opcode::ADD_REQUEST, &[Some(b"cn=n,dc=ex"), Some(b"")]),
        s(opcode::ADD_RESPONSE, &[Some(&[0]), Some(b""), Some(b""), None]),
        s(opcode::DEL_REQUEST, &[Some(b"cn=n,dc=ex")]),
        s(opcode::DEL_RESPONSE, &[Some(&[32]), Some(b"dc=ex"), Some(b"gone"), None]),
        s(opcode::MODIFY_DN_REQUEST, &[
            Some(b"cn=a"),
            Some(b"cn=b"),
            Some(&[0xff]),
            None,
        ]),
        s(opcode::MODIFY_DN_REQUEST, &[
            Some(b"cn=a"),
            Some(b"cn=b"),
            Some(&[0x00]),
            Some(b"ou=elsewhere"),
        ]),
        s(opcode::MODIFY_DN_RESPONSE, &[Some(&[0]), Some(b""), Some(b""), None]),
        s(opcode::COMPARE_REQUEST, &[Some(b"cn=a"), Some(b"cn"), Some(b"x")]),
        s(opcode::COMPARE_RESPONSE, &[Some(&[6]), Some(b""), Some(b""), None]),
        s(opcode::ABANDON_REQUEST, &[Some(&[5])]),
        s(opcode::SEARCH_RESULT_REFERENCE, &[Some(&hex!("04 03 61 62 63"))]),
        s(opcode::EXTENDED_REQUEST, &[Some(b"1.3.6.1.4.1.4203.1.11.3"), None]),
        s(opcode::EXTENDED_RESPONSE, &[
            Some(&[0]),
            Some(b""),
            Some(b""),
            None,
            None,
            Some(b"u:admin"),
        ]),
        s(opcode::INTERMEDIATE_RESPONSE, &[Some(b"1.2.3"), Some(b"v")]),
        s(opcode::STARTTLS_REQUEST, &[Some(b"1.3.6.1.4.1.1466.20037"), None]),
        s(opcode::PASSWD_MODIFY_REQUEST, &[
            Some(b"1.3.6.1.4.1.4203.1.11.1"),
            Some(b"uid=x"),
            None,
            Some(b"newpw"),
        ]),
        s(opcode::CANCEL_REQUEST, &[Some(b"1.3.6.1.1.8"), Some(&[5])]),
        s(opcode::START_LBURP_RESPONSE, &[
            Some(&[0]),
            Some(b""),
            Some(b""),
            None,
            Some(b"1.3.6.1.1.17.1"),
            Some(&[0x64]),
        ]),
        s(opcode::TURN_REQUEST, &[
            Some(b"1.3.6.1.1.19"),
            Some(&[0xff]),
            Some(b"conn-1"),
        ]),
        s(opcode::END_TXN_RESPONSE, &[
            Some(&[0]),
            Some(b""),
            Some(b""),
            None,
            Some(b"1.3.6.1.1.21.3"),
            Some(&[7]),
            None,
        ]),
        s(opcode::ABORTED_TXN_RESPONSE, &[
            Some(&[0]),
            Some(b""),
            Some(b""),
            None,
            Some(b"1.3.6.1.1.21.4"),
            Some(b"txn1"),
        ]),
    ];

    fn cursors(fields: &[Option<Vec<u8>>]) -> Vec<Cursor> {
        fields
            .iter()
            .map(|f| match f {
                Some(v) => Cursor::from(v.clone()),
                None => Cursor::null(),
            })
            .collect()
    }

    // first encode
    let mut sender = Endpoint::new(Arc::new(EndpointConfig::default())).expect("endpoint");
    let sink = SharedSink::default();
    sender.attach(io::Cursor::new(Vec::new()), sink.clone());
    for (i, (op, fields)) in samples.iter().enumerate() {
        let pool = Pool::new().expect("pool");
        sender
            .put_operation(pool, i as MsgId + 1, *op, &cursors(fields), &Cursor::null())
            .expect("encode");
    }
    run_put(&mut sender);
    let first = sink.take();

    // decode
    let events: Events = Default::default();
    let mut receiver = Endpoint::new(catchall_config(&events)).expect("endpoint");
    receiver.attach(io::Cursor::new(first.clone()), SharedSink::default());
    run_get(&mut receiver).expect("decode");
    let events = std::mem::take(&mut *events.lock().expect("events lock"));
    assert_eq!(events.len(), samples.len());

    // parsed fields survive, with extended operations remapped
    for (i, ((op, fields), (msgid, seen_op, seen_fields))) in
        samples.iter().zip(events.iter()).enumerate()
    {
        assert_eq!(*msgid, i as MsgId + 1);
        if *op == opcode::EXTENDED_REQUEST {
            assert_eq!(*seen_op, opcode::WHOAMI_REQUEST, "sample {}", i);
        } else {
            assert_eq!(seen_op, op, "sample {}", i);
        }
        assert_eq!(seen_fields, fields, "sample {}", i);
    }

    // second encode from what the decoder handed out
    let mut reencoder = Endpoint::new(Arc::new(EndpointConfig::default())).expect("endpoint");
    let sink2 = SharedSink::default();
    reencoder.attach(io::Cursor::new(Vec::new()), sink2.clone());
    for (msgid, op, fields) in &events {
        let pool = Pool::new().expect("pool");
        reencoder
            .put_operation(pool, *msgid, *op, &cursors(fields), &Cursor::null())
            .expect("re-encode");
    }
    run_put(&mut reencoder);
    assert_eq!(sink2.take(), first);
}

#[test]
fn controls_ride_along_unchanged() {
    let _g = lock();
    install_allocator(Arc::new(HeapPools));
    // one control: 30 1b { 04 16 "1.3.6.1.4.1.1466.20037", 01 01 ff }
    let control: Vec<u8> = {
        let mut v = hex!("30 1b 04 16").to_vec();
        v.extend_from_slice(b"1.3.6.1.4.1.1466.20037");
        v.extend_from_slice(&hex!("01 01 ff"));
        v
    };
    let mut sender = Endpoint::new(Arc::new(EndpointConfig::default())).expect("endpoint");
    let sink = SharedSink::default();
    sender.attach(io::Cursor::new(Vec::new()), sink.clone());
    let pool = Pool::new().expect("pool");
    let fields = [
        Cursor::from(vec![0x03]),
        Cursor::from(b"cn=admin,dc=ex".to_vec()),
        Cursor::from(b"secret".to_vec()),
        Cursor::null(),
        Cursor::null(),
    ];
    sender
        .put_operation(
            pool,
            7,
            opcode::BIND_REQUEST,
            &fields,
            &Cursor::from(control.clone()),
        )
        .expect("encode");
    run_put(&mut sender);
    let wire = sink.take();

    // the controls land behind the operation under the [0] wrapper
    let mut expected_tail = vec![0xa0, control.len() as u8];
    expected_tail.extend_from_slice(&control);
    assert!(wire.ends_with(&expected_tail));

    // and come back out as the same content octets
    let got: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_of_controls = got.clone();
    let registry = OpRegistry::new().at(
        opcode::BIND_REQUEST,
        move |_lil: &mut Endpoint,
              pool: Pool,
              _msgid: MsgId,
              _op: Opcode,
              _data: &[Cursor],
              controls: &Cursor|
              -> ldapstack::Result<()> {
            sink_of_controls
                .lock()
                .expect("controls lock")
                .push(controls.as_slice().to_vec());
            pool.end();
            Ok(())
        },
    );
    let config = Arc::new(EndpointConfig {
        registry,
        ..EndpointConfig::default()
    });
    let mut receiver = Endpoint::new(config).expect("endpoint");
    receiver.attach(io::Cursor::new(wire), SharedSink::default());
    run_get(&mut receiver).expect("decode");
    let got = got.lock().expect("controls lock");
    assert_eq!(got.len(), 1);
    assert_eq!(got[0], control);
}
