#[rocket::launch]
fn rocket() -> _ {
    vidtube_api::rocket()
}
