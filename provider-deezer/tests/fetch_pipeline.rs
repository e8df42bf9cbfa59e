//! Fetch pipeline scenarios against a mocked gateway

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{ByteSource, HttpClient, HttpRequest, HttpResponse};
use bridge_traits::transcode::{AudioFrame, AudioFrameStream, EncoderSettings, Transcoder};
use bytes::Bytes;
use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
use futures::StreamExt;
use mockall::mock;
use provider_deezer::{encrypt, DeezerError, MasterKey, MediaFetcher, SessionManager};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

mock! {
    HttpClient {}

    #[async_trait]
    impl HttpClient for HttpClient {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        async fn download_stream(&self, url: String) -> BridgeResult<ByteSource>;
    }
}

/// Reads the whole input and emits it as a single frame.
struct CollectingTranscoder;

#[async_trait]
impl Transcoder for CollectingTranscoder {
    async fn to_frames(&self, mut input: ByteSource) -> BridgeResult<AudioFrameStream> {
        let mut buf = Vec::new();
        input.read_to_end(&mut buf).await?;
        let frames = futures::stream::iter(vec![Ok(AudioFrame::new(Bytes::from(buf)))]);
        Ok(AudioFrameStream::new(EncoderSettings::default(), frames))
    }
}

const MASTER: &str = "g4el58wc0zvf9na1";
const MEDIA_URL: &str = "https://cdn.example/media/3135556.mp3";

fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        headers: HashMap::new(),
        body: Bytes::from(body.to_string()),
    }
}

fn plain_payload() -> Vec<u8> {
    (0..10_000u32).map(|i| (i % 253) as u8).collect()
}

fn expect_handshake(mock: &mut MockHttpClient, times: usize) {
    mock.expect_execute()
        .withf(|req| req.url.contains("method=deezer.ping"))
        .times(times)
        .returning(|_| Ok(response(200, r#"{"error":[],"results":{"SESSION":"sid"}}"#)));
    mock.expect_execute()
        .withf(|req| req.url.contains("method=deezer.getUserData"))
        .times(times)
        .returning(|_| {
            Ok(response(
                200,
                r#"{"error":[],"results":{"USER":{"OPTIONS":{"license_token":"lic","web_hq":false,"mobile_hq":false}},"checkForm":"api"}}"#,
            ))
        });
}

fn expect_song_data(mock: &mut MockHttpClient, times: usize) {
    mock.expect_execute()
        .withf(|req| req.url.contains("method=song.getData"))
        .times(times)
        .returning(|req| {
            assert!(req.url.contains("api_token=api"));
            let body: serde_json::Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
            assert_eq!(body["sng_id"], "3135556");
            Ok(response(
                200,
                r#"{"error":[],"results":{"SNG_ID":"3135556","TRACK_TOKEN":"tok","FILESIZE_MP3_320":"9000000"}}"#,
            ))
        });
}

fn fetcher(mock: MockHttpClient, bus: Option<EventBus>) -> MediaFetcher {
    let http: Arc<dyn HttpClient> = Arc::new(mock);
    let mut session = SessionManager::new(http.clone(), None);
    if let Some(bus) = bus {
        session = session.with_event_bus(bus);
    }
    MediaFetcher::new(
        http,
        Arc::new(session),
        Arc::new(CollectingTranscoder),
        MasterKey::parse(MASTER).unwrap(),
    )
}

#[tokio::test]
async fn handshake_runs_once_across_fetches() {
    let mut mock = MockHttpClient::new();
    expect_handshake(&mut mock, 1);
    expect_song_data(&mut mock, 2);
    mock.expect_execute()
        .withf(|req| req.url == "https://media.deezer.com/v1/get_url")
        .times(2)
        .returning(|req| {
            let body: serde_json::Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
            assert_eq!(body["license_token"], "lic");
            assert_eq!(body["track_tokens"][0], "tok");
            assert_eq!(body["media"][0]["formats"][0]["cipher"], "BF_CBC_STRIPE");
            // Not eligible for 320 even though the file exists.
            assert_eq!(body["media"][0]["formats"][0]["format"], "MP3_128");
            Ok(response(
                200,
                &format!(r#"{{"data":[{{"media":[{{"sources":[{{"url":"{}","provider":"ak"}}]}}]}}]}}"#, MEDIA_URL),
            ))
        });

    let ciphered = encrypt(&plain_payload(), "3135556", &MasterKey::parse(MASTER).unwrap()).unwrap();
    mock.expect_download_stream()
        .withf(|url| url == MEDIA_URL)
        .times(2)
        .returning(move |_| Ok(Box::new(Cursor::new(ciphered.clone())) as ByteSource));

    let fetcher = fetcher(mock, None);

    for _ in 0..2 {
        let mut frames = fetcher.fetch_media("3135556").await.unwrap();
        let frame = frames.next().await.unwrap().unwrap();
        assert_eq!(&frame.pcm[..], &plain_payload()[..]);
    }
}

#[tokio::test]
async fn concurrent_first_fetches_share_one_handshake() {
    let mut mock = MockHttpClient::new();
    expect_handshake(&mut mock, 1);
    expect_song_data(&mut mock, 2);
    mock.expect_execute()
        .withf(|req| req.url == "https://media.deezer.com/v1/get_url")
        .times(2)
        .returning(|_| {
            Ok(response(
                200,
                &format!(r#"{{"data":[{{"media":[{{"sources":[{{"url":"{}"}}]}}]}}]}}"#, MEDIA_URL),
            ))
        });
    mock.expect_download_stream()
        .times(2)
        .returning(|_| Ok(Box::new(Cursor::new(Vec::new())) as ByteSource));

    let fetcher = fetcher(mock, None);
    let (a, b) = tokio::join!(fetcher.fetch_decrypted("3135556"), fetcher.fetch_decrypted("3135556"));
    assert!(a.is_ok());
    assert!(b.is_ok());
}

#[tokio::test]
async fn rejected_media_url_skips_download_and_clears_session() {
    let mut mock = MockHttpClient::new();
    expect_handshake(&mut mock, 1);
    expect_song_data(&mut mock, 1);
    mock.expect_execute()
        .withf(|req| req.url == "https://media.deezer.com/v1/get_url")
        .times(1)
        .returning(|_| {
            Ok(response(
                200,
                r#"{"data":[{"errors":[{"code":2002,"message":"Invalid license token"}]}]}"#,
            ))
        });
    mock.expect_download_stream().times(0);

    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let fetcher = fetcher(mock, Some(bus));

    let err = fetcher.fetch_media("3135556").await.unwrap_err();
    assert!(matches!(err, DeezerError::MediaUrlRejected { .. }));
    assert!(err.is_licensing());
    assert!(err.to_string().contains("Invalid license token"));
    assert!(!fetcher.session().is_established().await);

    let mut saw_invalidated = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, CoreEvent::Session(SessionEvent::Invalidated { .. })) {
            saw_invalidated = true;
        }
    }
    assert!(saw_invalidated);
}

#[tokio::test]
async fn http_error_from_media_endpoint_is_licensing_failure() {
    let mut mock = MockHttpClient::new();
    expect_handshake(&mut mock, 1);
    expect_song_data(&mut mock, 1);
    mock.expect_execute()
        .withf(|req| req.url == "https://media.deezer.com/v1/get_url")
        .times(1)
        .returning(|_| Ok(response(403, "forbidden")));
    mock.expect_download_stream().times(0);

    let err = fetcher(mock, None).fetch_media("3135556").await.unwrap_err();
    match err {
        DeezerError::MediaUrlRejected { message } => assert!(message.contains("403")),
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn song_data_error_payload_is_gateway_error() {
    let mut mock = MockHttpClient::new();
    expect_handshake(&mut mock, 1);
    mock.expect_execute()
        .withf(|req| req.url.contains("method=song.getData"))
        .times(1)
        .returning(|_| {
            Ok(response(
                200,
                r#"{"error":{"DATA_ERROR":"song not found"},"results":{}}"#,
            ))
        });

    let err = fetcher(mock, None).fetch_media("0").await.unwrap_err();
    match err {
        DeezerError::Gateway { method, message } => {
            assert_eq!(method, "song.getData");
            assert!(message.contains("song not found"));
        }
        other => panic!("expected gateway error, got {:?}", other),
    }
}

#[tokio::test]
async fn download_failure_keeps_session() {
    let mut mock = MockHttpClient::new();
    expect_handshake(&mut mock, 1);
    expect_song_data(&mut mock, 1);
    mock.expect_execute()
        .withf(|req| req.url == "https://media.deezer.com/v1/get_url")
        .returning(|_| {
            Ok(response(
                200,
                &format!(r#"{{"data":[{{"media":[{{"sources":[{{"url":"{}"}}]}}]}}]}}"#, MEDIA_URL),
            ))
        });
    mock.expect_download_stream()
        .times(1)
        .returning(|_| Err(BridgeError::OperationFailed("HTTP error: 404".to_string())));

    let fetcher = fetcher(mock, None);
    let err = fetcher.fetch_media("3135556").await.unwrap_err();

    assert!(!err.is_licensing());
    assert!(fetcher.session().is_established().await);
}

#[tokio::test]
async fn isrc_lookup_resolves_track_id() {
    let mut mock = MockHttpClient::new();
    mock.expect_execute()
        .withf(|req| req.url == "https://api.deezer.com/track/isrc:GBAYE0601498")
        .times(1)
        .returning(|_| Ok(response(200, r#"{"id":3135556,"title":"Harder Better Faster Stronger"}"#)));
    mock.expect_execute()
        .withf(|req| req.url == "https://api.deezer.com/track/isrc:XX0000000000")
        .times(1)
        .returning(|_| {
            Ok(response(
                200,
                r#"{"error":{"type":"DataException","message":"no data","code":800}}"#,
            ))
        });

    let fetcher = fetcher(mock, None);
    assert_eq!(fetcher.lookup_isrc("GBAYE0601498").await.unwrap(), "3135556");
    assert!(matches!(
        fetcher.lookup_isrc("XX0000000000").await,
        Err(DeezerError::IsrcNotFound { .. })
    ));
}
