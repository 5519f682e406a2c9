use kube::CustomResourceExt;

fn main() {
    print!(
        "{}",
        serde_yaml::to_string(&workshop_operator::crds::Workshop::crd()).unwrap()
    );
}
