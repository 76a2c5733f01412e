use comms::{
    Deserialize, Serialize,
    msg::{Command, Msg, Payload},
};
use tokio::io::{self, AsyncWriteExt};

struct MyStr<'a>(&'a str);

impl<'a> Serialize<'a> for MyStr<'_> {
    fn serialize(&'a self, _buf: &mut Vec<u8>) -> Option<&'a [u8]> {
        Some(self.0.as_bytes())
    }
}

impl<'a> Deserialize<'a> for MyStr<'a> {
    fn deserialize(buf: &'a [u8]) -> std::io::Result<Self> {
        Ok(Self(std::str::from_utf8(buf).unwrap()))
    }
}

#[tokio::test]
async fn send_recv() {
    const SIZE: usize = 128;

    let msg = MyStr("Hello, world!");

    let (one, two) = io::duplex(SIZE);
    let (rx, tx) = io::split(one);
    let (_, mut tx) = comms::channel(rx, tx);

    tx.send(&msg).await.unwrap();

    let (rx, tx) = io::split(two);
    let (mut rx, _) = comms::channel(rx, tx);

    let s: MyStr = rx.recv().await.unwrap();

    assert_eq!(msg.0, s.0);
}

#[tokio::test]
async fn chunk_then_control_arrive_in_order() {
    let (one, two) = io::duplex(4096);
    let (_, tx) = io::split(one);
    let (rx, _) = io::split(two);
    let mut tx = comms::channel(io::empty(), tx).1;
    let mut rx = comms::channel(rx, io::sink()).0;

    let data: Vec<f64> = (0..12).map(f64::from).collect();
    let chunk = Msg::Data(Payload::Chunk {
        rows: 4,
        cols: 3,
        first: 0,
        batch: 4,
        data: &data,
    });

    let send = async {
        tx.send(&chunk).await?;
        tx.send(&Msg::Control(Command::BarrierEnter)).await
    };

    let recv = async {
        let mut rx_buf: Vec<f64> = Vec::new();
        let received = match rx.recv_into(&mut rx_buf).await? {
            Msg::Data(Payload::Chunk { rows, cols, data, .. }) => (rows, cols, data.to_vec()),
            msg => panic!("unexpected message {msg:?}"),
        };

        let next = match rx.recv().await? {
            Msg::Control(cmd) => cmd,
            msg => panic!("unexpected message {msg:?}"),
        };
        Ok::<_, std::io::Error>((received, next))
    };

    let (sent, received) = tokio::join!(send, recv);
    sent.unwrap();

    let ((rows, cols, values), next) = received.unwrap();
    assert_eq!((rows, cols), (4, 3));
    assert_eq!(values, data);
    assert_eq!(next, Command::BarrierEnter);
}

#[tokio::test]
async fn oversized_frame_is_rejected() {
    let (mut one, two) = io::duplex(64);
    let (rx, _) = io::split(two);
    let mut rx = comms::channel(rx, io::sink()).0;

    let len = (comms::MAX_FRAME_LEN as u64 + 1).to_be_bytes();
    one.write_all(&len).await.unwrap();

    let err = rx.recv::<Msg>().await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}

#[tokio::test]
async fn closed_stream_surfaces_as_error() {
    let (one, two) = io::duplex(64);
    drop(one);

    let (rx, _) = io::split(two);
    let mut rx = comms::channel(rx, io::sink()).0;

    let err = rx.recv::<Msg>().await.unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
}
