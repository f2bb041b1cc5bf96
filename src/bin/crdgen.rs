use kube::core::CustomResourceExt;
use ostk_ctlplane::crd::control_plane::ControlPlane;
use ostk_ctlplane::crd::nova::Nova;

fn main() {
    for crd in [ControlPlane::crd(), Nova::crd()] {
        let yaml = serde_yaml::to_string(&crd).expect("serialize CRD to YAML");
        println!("---");
        println!("{}", yaml);
    }
}
