use super::*;
use serde_json::json;

fn message(value: serde_json::Value) -> RatingMessage {
    serde_json::from_value(value).expect("valid rating message")
}

// ============================================================================
// Movie normalization
// ============================================================================

#[test]
fn test_movie_reads_array_form() {
    let movie: Movie = serde_json::from_value(json!({
        "id": 7,
        "title": "Interstellar",
        "year": 2014,
        "genres": ["Adventure", "Sci-Fi"],
        "directors": ["Christopher Nolan"],
        "plot": "Explorers travel through a wormhole."
    }))
    .unwrap();

    assert_eq!(movie.genres, vec!["Adventure", "Sci-Fi"]);
    assert_eq!(movie.directors, vec!["Christopher Nolan"]);
}

#[test]
fn test_movie_normalizes_singular_fields() {
    let movie: Movie = serde_json::from_value(json!({
        "id": 3,
        "title": "Alien",
        "year": 1979,
        "genre": "Horror",
        "director": "Ridley Scott",
        "plot": "In space no one can hear you scream."
    }))
    .unwrap();

    assert_eq!(movie.genres, vec!["Horror"]);
    assert_eq!(movie.directors, vec!["Ridley Scott"]);
}

#[test]
fn test_movie_accepts_integral_doubles() {
    let movie: Movie = serde_json::from_value(json!({
        "id": 42.0,
        "title": "Heat",
        "year": 1995.0,
        "genres": "Crime"
    }))
    .unwrap();

    assert_eq!(movie.id, 42);
    assert_eq!(movie.year, 1995);
    assert_eq!(movie.genres, vec!["Crime"]);
    assert!(movie.directors.is_empty());
    assert_eq!(movie.plot, "");
}

#[test]
fn test_movie_rejects_fractional_id() {
    let result: Result<Movie, _> = serde_json::from_value(json!({
        "id": 4.5,
        "title": "Nope",
        "year": 2000
    }));
    assert!(result.is_err());
}

#[test]
fn test_movie_serializes_canonical_names() {
    let movie = Movie {
        id: 1,
        title: "Up".to_string(),
        year: 2009,
        genres: vec!["Animation".to_string()],
        directors: vec!["Pete Docter".to_string()],
        plot: String::new(),
    };
    let value = serde_json::to_value(&movie).unwrap();
    assert!(value.get("genres").is_some());
    assert!(value.get("genre").is_none());
    assert!(value.get("directors").is_some());
}

// ============================================================================
// MovieRef
// ============================================================================

#[test]
fn test_movie_ref_number_and_text() {
    let m = message(json!({ "movieId": 7 }));
    assert_eq!(m.movie_id.as_ref().and_then(MovieRef::as_id), Some(7));

    let m = message(json!({ "movieId": " 12 " }));
    assert_eq!(m.movie_id.as_ref().and_then(MovieRef::as_id), Some(12));

    let m = message(json!({ "movieId": "tt0816692" }));
    assert_eq!(m.movie_id.as_ref().and_then(MovieRef::as_id), None);
    assert!(m.movie_id.as_ref().is_some_and(MovieRef::is_present));
}

#[test]
fn test_movie_ref_zero_and_blank_are_absent() {
    assert!(!MovieRef::Number(0).is_present());
    assert!(!MovieRef::Text("  ".to_string()).is_present());
    assert!(MovieRef::Number(9999).is_present());
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validate_complete_request() {
    let request = message(json!({
        "userId": "u1",
        "movieId": 7,
        "rating": 5,
        "comment": ""
    }))
    .validate()
    .unwrap();

    assert_eq!(request.user_id, "u1");
    assert_eq!(request.movie_id, MovieRef::Number(7));
    assert_eq!(request.rating, 5);
    assert_eq!(request.comment, "");
    assert!(request.timestamp.is_none());
}

#[test]
fn test_validate_defaults_comment() {
    let request = message(json!({ "userId": "u1", "movieId": 7, "rating": 3 }))
        .validate()
        .unwrap();
    assert_eq!(request.comment, "");
}

#[test]
fn test_validate_missing_fields() {
    let cases = [
        json!({ "movieId": 7, "rating": 3 }),
        json!({ "userId": "", "movieId": 7, "rating": 3 }),
        json!({ "userId": "u1", "rating": 3 }),
        json!({ "userId": "u1", "movieId": 0, "rating": 3 }),
        json!({ "userId": "u1", "movieId": "", "rating": 3 }),
        json!({ "userId": "u1", "movieId": 7 }),
        json!({ "userId": "u1", "movieId": 7, "rating": null }),
    ];

    for case in cases {
        assert_eq!(
            message(case.clone()).validate(),
            Err(ValidationError::MissingFields),
            "case: {}",
            case
        );
    }
}

#[test]
fn test_validate_rating_range() {
    for rating in [0, 6, -1, 100] {
        let result = message(json!({ "userId": "u1", "movieId": 7, "rating": rating })).validate();
        assert_eq!(result, Err(ValidationError::RatingOutOfRange(rating)));
    }
    for rating in MIN_RATING..=MAX_RATING {
        let result = message(json!({ "userId": "u1", "movieId": 7, "rating": rating })).validate();
        assert!(result.is_ok());
    }
}

#[test]
fn test_validate_numeric_user_id_and_text_year() {
    let request = message(json!({
        "userId": 501,
        "movieId": "7",
        "movieName": "Interstellar",
        "year": "2014",
        "rating": 4
    }))
    .validate()
    .unwrap();

    assert_eq!(request.user_id, "501");
    assert_eq!(request.year, Some(2014));
}

#[test]
fn test_validate_parses_timestamp() {
    let request = message(json!({
        "userId": "u1",
        "movieId": 7,
        "rating": 4,
        "timestamp": "2024-03-01T12:30:00.000Z"
    }))
    .validate()
    .unwrap();

    let ts = request.timestamp.unwrap();
    assert_eq!(ts.to_rfc3339(), "2024-03-01T12:30:00+00:00");
}

#[test]
fn test_validate_ignores_bad_timestamp() {
    let request = message(json!({
        "userId": "u1",
        "movieId": 7,
        "rating": 4,
        "timestamp": "yesterday"
    }))
    .validate()
    .unwrap();
    assert!(request.timestamp.is_none());
}

#[test]
fn test_validate_reads_epoch_millis_timestamp() {
    let request = message(json!({
        "userId": "u1",
        "movieId": 7,
        "rating": 4,
        "timestamp": 1_709_296_200_000_i64
    }))
    .validate()
    .unwrap();

    let ts = request.timestamp.unwrap();
    assert_eq!(ts.to_rfc3339(), "2024-03-01T12:30:00+00:00");
}

#[test]
fn test_non_text_timestamp_is_ignored() {
    for timestamp in [json!(true), json!([2024, 3, 1]), json!(null)] {
        let request = message(json!({
            "userId": "u1",
            "movieId": 7,
            "rating": 4,
            "timestamp": timestamp
        }))
        .validate()
        .unwrap();
        assert!(request.timestamp.is_none());
    }
}

#[test]
fn test_lookup_name_trims() {
    let request = message(json!({
        "userId": "u1",
        "movieId": 1,
        "movieName": "  Heat  ",
        "rating": 2
    }))
    .validate()
    .unwrap();
    assert_eq!(request.lookup_name(), Some("Heat"));

    let blank = message(json!({ "userId": "u1", "movieId": 1, "movieName": "   ", "rating": 2 }))
        .validate()
        .unwrap();
    assert_eq!(blank.lookup_name(), None);
}

#[test]
fn test_request_wire_format() {
    let request = message(json!({ "userId": "u1", "movieId": 7, "rating": 5 }))
        .validate()
        .unwrap();
    let wire = serde_json::to_value(&request).unwrap();

    assert_eq!(wire["userId"], "u1");
    assert_eq!(wire["movieId"], 7);
    assert_eq!(wire["rating"], 5);
    assert_eq!(wire["comment"], "");
    assert!(wire.get("movieName").is_none());
    assert!(wire.get("year").is_none());
}

// ============================================================================
// Stored ratings
// ============================================================================

#[test]
fn test_into_new_rating_uses_now_without_timestamp() {
    let request = message(json!({ "userId": "u1", "movieId": 7, "rating": 5 }))
        .validate()
        .unwrap();
    let now = Utc::now();
    let new = request.into_new_rating("abc".to_string(), now);

    assert_eq!(new.movie_key, "abc");
    assert_eq!(new.timestamp, now);
}

#[test]
fn test_rating_detail_flattens() {
    let rating = Rating {
        id: "r1".to_string(),
        movie_key: "m1".to_string(),
        user_id: "u1".to_string(),
        rating: 4,
        comment: "good".to_string(),
        timestamp: Utc::now(),
    };
    let detail = RatingDetail {
        rating,
        movie: MovieBrief {
            title: "Heat".to_string(),
            genres: vec!["Crime".to_string()],
            year: 1995,
        },
    };

    let value = serde_json::to_value(&detail).unwrap();
    assert_eq!(value["_id"], "r1");
    assert_eq!(value["movieId"], "m1");
    assert_eq!(value["userId"], "u1");
    assert_eq!(value["movie"]["title"], "Heat");
}

#[test]
fn test_round2() {
    assert_eq!(round2(4.0), 4.0);
    assert_eq!(round2(10.0 / 3.0), 3.33);
    assert_eq!(round2(11.0 / 3.0), 3.67);
}

#[test]
fn test_round2_ties_to_even() {
    // Eight ratings summing to 17 and 19.
    assert_eq!(round2(17.0 / 8.0), 2.12);
    assert_eq!(round2(19.0 / 8.0), 2.38);
    assert_eq!(round2(4.5), 4.5);
}

// ============================================================================
// Movie drafts
// ============================================================================

#[test]
fn test_draft_into_movie() {
    let draft: MovieDraft = serde_json::from_value(json!({
        "id": "21350",
        "title": "Dune: Part Two",
        "year": 2024,
        "genre": "Sci-Fi",
        "plot": "Paul unites with the Fremen."
    }))
    .unwrap();

    let movie = draft.into_movie().unwrap();
    assert_eq!(movie.id, 21350);
    assert_eq!(movie.genres, vec!["Sci-Fi"]);
    assert!(movie.directors.is_empty());
}

#[test]
fn test_draft_missing_fields() {
    let cases = [
        json!({ "title": "X", "year": 2000, "plot": "p" }),
        json!({ "id": 1, "title": " ", "year": 2000, "plot": "p" }),
        json!({ "id": 1, "title": "X", "plot": "p" }),
        json!({ "id": 1, "title": "X", "year": 2000 }),
        json!({ "id": 0, "title": "X", "year": 2000, "plot": "p" }),
    ];

    for case in cases {
        let draft: MovieDraft = serde_json::from_value(case.clone()).unwrap();
        assert_eq!(
            draft.into_movie(),
            Err(ValidationError::MissingMovieFields),
            "case: {}",
            case
        );
    }
}

#[test]
fn test_draft_apply_to_keeps_id_and_absent_fields() {
    let mut movie = Movie {
        id: 3,
        title: "Alien".to_string(),
        year: 1979,
        genres: vec!["Horror".to_string()],
        directors: vec!["Ridley Scott".to_string()],
        plot: "In space no one can hear you scream.".to_string(),
    };

    let draft: MovieDraft = serde_json::from_value(json!({
        "id": 99,
        "title": "Alien (Director's Cut)",
        "year": 0,
        "genre": ["Horror", "Sci-Fi"],
        "plot": "  "
    }))
    .unwrap();
    draft.apply_to(&mut movie);

    assert_eq!(movie.id, 3);
    assert_eq!(movie.title, "Alien (Director's Cut)");
    assert_eq!(movie.year, 1979);
    assert_eq!(movie.genres, vec!["Horror", "Sci-Fi"]);
    assert_eq!(movie.directors, vec!["Ridley Scott"]);
    assert_eq!(movie.plot, "In space no one can hear you scream.");
}
